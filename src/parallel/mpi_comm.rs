//! MPI-based communication.
//!
//! `MpiComm` wraps the world communicator and implements [`Comm`](super::Comm) for
//! distributed-memory runs: sum/max/min all-reduce for inner products and mesh
//! statistics, and the blocking neighbour exchange used for ghost cell values.
//! Only available with the `mpi` feature.
//!
//! # References
//! - [MPI Standard](https://www.mpi-forum.org/)

use mpi::collective::SystemOperation;
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use crate::error::DgError;

/// MPI communicator wrapper for distributed parallelism.
///
/// The universe is kept alive for as long as the communicator exists; dropping it
/// finalizes MPI.
pub struct MpiComm {
    _universe: Universe,
    /// The MPI world communicator (all processes in the job).
    pub world: SimpleCommunicator,
    /// The rank (ID) of this process within the communicator.
    pub rank: usize,
    /// The total number of processes in the communicator.
    pub size: usize,
}

impl MpiComm {
    /// Initializes MPI.
    pub fn new() -> Result<Self, DgError> {
        let universe = mpi::initialize()
            .ok_or_else(|| DgError::Config("MPI was already initialized".to_string()))?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Ok(MpiComm { _universe: universe, world, rank, size })
    }

    fn reduce_with(&self, x: f64, op: SystemOperation) -> f64 {
        let mut y = x;
        self.world.all_reduce_into(&x, &mut y, &op);
        y
    }
}

impl super::Comm for MpiComm {
    fn rank(&self) -> usize { self.rank }
    fn size(&self) -> usize { self.size }
    fn barrier(&self) { self.world.barrier(); }

    fn all_reduce(&self, x: f64) -> f64 {
        self.reduce_with(x, SystemOperation::sum())
    }

    fn all_reduce_max(&self, x: f64) -> f64 {
        self.reduce_with(x, SystemOperation::max())
    }

    fn all_reduce_min(&self, x: f64) -> f64 {
        self.reduce_with(x, SystemOperation::min())
    }

    /// Blocking exchange with ascending peers. Of each pair, the lower rank sends
    /// first and the higher rank receives first, so no cycle of waiting sends forms.
    fn exchange(&self, mut sends: Vec<(usize, Vec<f64>)>) -> Vec<(usize, Vec<f64>)> {
        sends.sort_by_key(|(peer, _)| *peer);
        let mut received = Vec::with_capacity(sends.len());
        for (peer, buffer) in sends {
            if peer == self.rank {
                received.push((peer, buffer));
                continue;
            }
            let process = self.world.process_at_rank(peer as i32);
            if self.rank < peer {
                process.send(&buffer[..]);
                let (msg, _status) = process.receive_vec::<f64>();
                received.push((peer, msg));
            } else {
                let (msg, _status) = process.receive_vec::<f64>();
                process.send(&buffer[..]);
                received.push((peer, msg));
            }
        }
        received
    }
}
