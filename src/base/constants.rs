/// Defines the directory where the simulation result files are saved
pub const DEFAULT_OUT_DIR: &str = "/tmp/pmfem/results";

/// Defines an auxiliary directory where the test result files are saved
pub const DEFAULT_TEST_DIR: &str = "/tmp/pmfem/test";

/// Defines the smallest allowed dt_min (Config)
pub const CONFIG_MIN_DT_MIN: f64 = 1e-10;

/// Defines the smallest allowed tolerance (Config)
pub const CONFIG_MIN_TOL: f64 = 1e-15;

/// Defines the smallest number satisfying 1.0 + ϵ > 1.0 used to derive the iterations tolerance
pub const MACHINE_EPSILON: f64 = 1e-16;
