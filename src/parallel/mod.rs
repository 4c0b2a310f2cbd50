//! Communication layer for the distributed cell partition.
//!
//! Every rank owns a contiguous range of cells. Collective operations (reductions for
//! inner products and mesh statistics, neighbour exchange of ghost cell values) go
//! through the [`Comm`] trait so the same operator code runs serially, on a rayon
//! thread pool within one process, or across MPI ranks.

/// Collective operations used by vectors, grids and solvers.
pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self);
    /// Global sum.
    fn all_reduce(&self, x: f64) -> f64;
    /// Global maximum.
    fn all_reduce_max(&self, x: f64) -> f64;
    /// Global minimum.
    fn all_reduce_min(&self, x: f64) -> f64;
    /// Pairwise neighbour exchange.
    ///
    /// `sends` holds one buffer per destination rank. Every rank listed as a
    /// destination must list this rank as well, so that the pattern is symmetric.
    /// Returns the received buffers tagged with their source rank.
    fn exchange(&self, sends: Vec<(usize, Vec<f64>)>) -> Vec<(usize, Vec<f64>)>;
    /// Global dot product of two local slices.
    fn dot(&self, a: &[f64], b: &[f64]) -> f64 {
        let local = a.iter().zip(b).map(|(&x, &y)| x * y).sum::<f64>();
        self.all_reduce(local)
    }
}

#[cfg(feature = "mpi")]
pub mod mpi_comm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

#[cfg(feature = "rayon")]
pub mod rayon_comm;
#[cfg(feature = "rayon")]
pub use rayon_comm::RayonComm;

pub enum UniverseComm {
    Serial,
    #[cfg(feature = "rayon")]
    Rayon(RayonComm),
    #[cfg(feature = "mpi")]
    Mpi(MpiComm),
}

impl Default for UniverseComm {
    /// Single process; uses the rayon pool when the feature is enabled.
    fn default() -> Self {
        #[cfg(feature = "rayon")]
        {
            UniverseComm::Rayon(RayonComm::new())
        }
        #[cfg(not(feature = "rayon"))]
        {
            UniverseComm::Serial
        }
    }
}

impl std::fmt::Debug for UniverseComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UniverseComm::Serial => write!(f, "Serial"),
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(_) => write!(f, "Rayon"),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => write!(f, "Mpi(rank {} of {})", comm.rank, comm.size),
        }
    }
}

impl Comm for UniverseComm {
    fn rank(&self) -> usize {
        match self {
            UniverseComm::Serial => 0,
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.rank(),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.rank(),
        }
    }
    fn size(&self) -> usize {
        match self {
            UniverseComm::Serial => 1,
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.size(),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.size(),
        }
    }
    fn barrier(&self) {
        match self {
            UniverseComm::Serial => {}
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.barrier(),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.barrier(),
        }
    }
    fn all_reduce(&self, x: f64) -> f64 {
        match self {
            UniverseComm::Serial => x,
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.all_reduce(x),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.all_reduce(x),
        }
    }
    fn all_reduce_max(&self, x: f64) -> f64 {
        match self {
            UniverseComm::Serial => x,
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.all_reduce_max(x),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.all_reduce_max(x),
        }
    }
    fn all_reduce_min(&self, x: f64) -> f64 {
        match self {
            UniverseComm::Serial => x,
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.all_reduce_min(x),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.all_reduce_min(x),
        }
    }
    fn exchange(&self, sends: Vec<(usize, Vec<f64>)>) -> Vec<(usize, Vec<f64>)> {
        match self {
            UniverseComm::Serial => sends.into_iter().filter(|(rank, _)| *rank == 0).collect(),
            #[cfg(feature = "rayon")]
            UniverseComm::Rayon(comm) => comm.exchange(sends),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.exchange(sends),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_process_reductions_are_identity() {
        let comm = UniverseComm::default();
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.size(), 1);
        assert_eq!(comm.all_reduce(2.5), 2.5);
        assert_eq!(comm.all_reduce_max(-1.0), -1.0);
        assert_eq!(comm.all_reduce_min(3.0), 3.0);
        assert_eq!(comm.dot(&[1.0, 2.0], &[3.0, 4.0]), 11.0);
        comm.barrier();
    }

    #[test]
    fn serial_exchange_only_talks_to_itself() {
        let comm = UniverseComm::Serial;
        let received = comm.exchange(vec![(0, vec![1.0, 2.0])]);
        assert_eq!(received, vec![(0, vec![1.0, 2.0])]);
        assert!(comm.exchange(Vec::new()).is_empty());
    }
}
