//! Accumulated solver iteration counts of a run.

use log::info;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IterationStats {
    /// Number of solves (time steps or load steps).
    pub n_calls: usize,
    pub linear_iterations: usize,
    pub newton_iterations: usize,
}

impl IterationStats {
    pub fn push_linear(&mut self, linear: usize) {
        self.n_calls += 1;
        self.linear_iterations += linear;
    }

    pub fn push_nonlinear(&mut self, newton: usize, linear: usize) {
        self.n_calls += 1;
        self.newton_iterations += newton;
        self.linear_iterations += linear;
    }

    pub fn average_linear(&self) -> f64 {
        self.linear_iterations as f64 / (self.n_calls as f64).max(1.0)
    }

    pub fn average_newton(&self) -> f64 {
        self.newton_iterations as f64 / (self.n_calls as f64).max(1.0)
    }

    /// Linear iterations per Newton iteration, or per solve for linear runs.
    pub fn linear_per_newton(&self) -> f64 {
        let newton = self.average_newton();
        if newton > f64::MIN_POSITIVE { self.average_linear() / newton } else { self.average_linear() }
    }

    pub fn log_summary(&self, label: &str) {
        if self.newton_iterations > 0 {
            info!(
                "{label}: {} solves, {:.2} Newton iterations, {:.2} linear iterations ({:.2} per Newton iteration)",
                self.n_calls,
                self.average_newton(),
                self.average_linear(),
                self.linear_per_newton()
            );
        } else {
            info!("{label}: {} solves, {:.2} linear iterations", self.n_calls, self.average_linear());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_over_calls() {
        let mut stats = IterationStats::default();
        assert_eq!(stats.average_linear(), 0.0);
        stats.push_nonlinear(3, 30);
        stats.push_nonlinear(5, 50);
        assert_eq!(stats.average_newton(), 4.0);
        assert_eq!(stats.average_linear(), 40.0);
        assert_eq!(stats.linear_per_newton(), 10.0);

        let mut linear = IterationStats::default();
        linear.push_linear(7);
        assert_eq!(linear.linear_per_newton(), 7.0);
    }
}
