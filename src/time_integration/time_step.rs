//! Time step size selection.

pub use crate::config::TimeStepCalculation;

/// `Δt = cfl / p^e · h_min / |a|_max`.
pub fn calculate_time_step_cfl_global(cfl: f64, max_velocity: f64, h_min: f64, degree: usize, exponent: f64) -> f64 {
    cfl_time_step(cfl, max_velocity, h_min, degree, exponent)
}

/// CFL-limited step of one cell of size `h` with transport speed `speed`.
pub fn cfl_time_step(cfl: f64, speed: f64, h: f64, degree: usize, exponent: f64) -> f64 {
    if speed <= 0.0 {
        return f64::INFINITY;
    }
    cfl / (degree as f64).powf(exponent) * h / speed
}

/// Next adaptive step size: the CFL estimate, allowed to grow by at most
/// `limiting_factor` over the last step and capped by `max`.
pub fn adjust_time_step_size_adaptive(last: f64, estimate: f64, limiting_factor: f64, max: f64) -> f64 {
    estimate.min(limiting_factor * last).min(max)
}

/// Shortens `dt` so a step starting at `time` does not pass `end_time`.
pub(crate) fn clamp_to_end_time(time: f64, dt: f64, end_time: f64) -> f64 {
    let remaining = end_time - time;
    if remaining > 0.0 && dt > remaining { remaining } else { dt }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cfl_step_scales_with_degree_and_speed() {
        let dt1 = calculate_time_step_cfl_global(0.5, 2.0, 0.1, 1, 1.5);
        assert_relative_eq!(dt1, 0.025);
        let dt3 = calculate_time_step_cfl_global(0.5, 2.0, 0.1, 3, 1.5);
        assert_relative_eq!(dt3, 0.025 / 3f64.powf(1.5));
        assert_eq!(cfl_time_step(0.5, 0.0, 0.1, 2, 2.0), f64::INFINITY);
    }

    #[test]
    fn adaptive_growth_is_limited() {
        assert_relative_eq!(adjust_time_step_size_adaptive(0.1, 1.0, 1.2, 10.0), 0.12);
        assert_relative_eq!(adjust_time_step_size_adaptive(0.1, 0.05, 1.2, 10.0), 0.05);
        assert_relative_eq!(adjust_time_step_size_adaptive(0.1, 1.0, 1.2, 0.11), 0.11);
    }

    #[test]
    fn last_step_lands_on_end_time() {
        assert_relative_eq!(clamp_to_end_time(0.95, 0.1, 1.0), 0.05, epsilon = 1e-15);
        assert_relative_eq!(clamp_to_end_time(0.5, 0.1, 1.0), 0.1);
    }
}
