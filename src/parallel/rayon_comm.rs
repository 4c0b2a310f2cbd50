// rayon-based communication: one process, cell loops spread over the thread pool

pub struct RayonComm {
    threads: usize,
}

impl RayonComm {
    pub fn new() -> Self {
        let threads = num_cpus::get();
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
        RayonComm { threads }
    }

    /// Number of worker threads in the global pool.
    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl Default for RayonComm {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Comm for RayonComm {
    // The whole partition lives in this process, threads share it.
    fn rank(&self) -> usize { 0 }
    fn size(&self) -> usize { 1 }
    fn barrier(&self) { rayon::scope(|_| {}); }
    fn all_reduce(&self, x: f64) -> f64 { x }
    fn all_reduce_max(&self, x: f64) -> f64 { x }
    fn all_reduce_min(&self, x: f64) -> f64 { x }
    fn exchange(&self, sends: Vec<(usize, Vec<f64>)>) -> Vec<(usize, Vec<f64>)> {
        sends.into_iter().filter(|(rank, _)| *rank == 0).collect()
    }
}
