use crate::StrError;
use std::sync::{Arc, Barrier, Mutex};

/// Defines the collective operations among the ranks of a distributed simulation
///
/// All operations are blocking and must be called by every rank in the same order.
pub trait Communicator: Send {
    /// Returns the rank of this process (0 ≤ rank < size)
    fn rank(&self) -> usize;

    /// Returns the number of ranks
    fn size(&self) -> usize;

    /// Replaces `x` by the sum of `x` over all ranks
    ///
    /// The sum is performed in rank order; thus all ranks obtain the same bits.
    fn all_reduce_sum(&self, x: &mut [f64]) -> Result<(), StrError>;

    /// Returns true if any rank raised the stop flag (max-reduction of flags)
    fn any_stop(&self, stop: bool) -> Result<bool, StrError>;

    /// Returns the concatenation (in rank order) of the data from all ranks
    fn all_gather(&self, data: &[f64]) -> Result<Vec<f64>, StrError>;

    /// Indicates that this is the root rank
    fn root(&self) -> bool {
        self.rank() == 0
    }

    /// Indicates a distributed run with more than one rank
    fn distributed(&self) -> bool {
        self.size() > 1
    }
}

/// Implements a communicator for a single process
pub struct SerialComm {}

impl SerialComm {
    /// Allocates a new instance
    pub fn new() -> Self {
        SerialComm {}
    }
}

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn all_reduce_sum(&self, _x: &mut [f64]) -> Result<(), StrError> {
        Ok(())
    }
    fn any_stop(&self, stop: bool) -> Result<bool, StrError> {
        Ok(stop)
    }
    fn all_gather(&self, data: &[f64]) -> Result<Vec<f64>, StrError> {
        Ok(data.to_vec())
    }
}

/// Holds the data shared by a group of thread communicators
struct SharedSlots {
    barrier: Barrier,
    slots: Mutex<Vec<Vec<f64>>>,
}

/// Implements a communicator among threads of the same process
///
/// Each rank runs in its own thread. The exchanges go through a shared array of
/// slots (one per rank) synchronized by a barrier.
pub struct ThreadComm {
    rank: usize,
    size: usize,
    shared: Arc<SharedSlots>,
}

impl ThreadComm {
    /// Allocates a group of `size` communicators (one for each rank)
    pub fn group(size: usize) -> Result<Vec<ThreadComm>, StrError> {
        if size < 1 {
            return Err("the number of ranks must be ≥ 1");
        }
        let shared = Arc::new(SharedSlots {
            barrier: Barrier::new(size),
            slots: Mutex::new(vec![Vec::new(); size]),
        });
        Ok((0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect())
    }

    /// Deposits the data of this rank and returns the data of all ranks
    fn exchange(&self, data: &[f64]) -> Result<Vec<Vec<f64>>, StrError> {
        {
            let mut slots = self.shared.slots.lock().map_err(|_| "communicator lock is poisoned")?;
            slots[self.rank] = data.to_vec();
        }
        self.shared.barrier.wait();
        let all = {
            let slots = self.shared.slots.lock().map_err(|_| "communicator lock is poisoned")?;
            slots.clone()
        };
        // the slots must not be overwritten before every rank has read them
        self.shared.barrier.wait();
        Ok(all)
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
    fn all_reduce_sum(&self, x: &mut [f64]) -> Result<(), StrError> {
        let all = self.exchange(x)?;
        x.fill(0.0);
        for data in &all {
            if data.len() != x.len() {
                return Err("all_reduce_sum requires vectors with the same length on all ranks");
            }
            for i in 0..x.len() {
                x[i] += data[i];
            }
        }
        Ok(())
    }
    fn any_stop(&self, stop: bool) -> Result<bool, StrError> {
        let flag = if stop { 1.0 } else { 0.0 };
        let all = self.exchange(&[flag])?;
        Ok(all.iter().any(|data| data[0] > 0.0))
    }
    fn all_gather(&self, data: &[f64]) -> Result<Vec<f64>, StrError> {
        let all = self.exchange(data)?;
        Ok(all.concat())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
