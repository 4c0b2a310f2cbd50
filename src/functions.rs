//! Space–time functions supplied by the application: initial data, sources,
//! velocity fields and boundary data.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::grid::BoundaryId;

/// A scalar function of position and time.
pub trait Function: Send + Sync {
    fn value(&self, x: f64, t: f64) -> f64;
}

impl<F> Function for F
where
    F: Fn(f64, f64) -> f64 + Send + Sync,
{
    fn value(&self, x: f64, t: f64) -> f64 {
        self(x, t)
    }
}

/// `f(x, t) = c`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantFunction(pub f64);

impl Function for ConstantFunction {
    fn value(&self, _x: f64, _t: f64) -> f64 {
        self.0
    }
}

/// Boundary values supplied from outside the solver (e.g. by a coupled solver),
/// one value per boundary id. Unset ids read as zero.
#[derive(Debug, Default)]
pub struct FunctionCached {
    values: RwLock<HashMap<BoundaryId, f64>>,
}

impl FunctionCached {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, boundary_id: BoundaryId, value: f64) {
        self.values.write().insert(boundary_id, value);
    }

    pub fn get(&self, boundary_id: BoundaryId) -> f64 {
        self.values.read().get(&boundary_id).copied().unwrap_or(0.0)
    }
}

/// Analytical fields of one convection–diffusion problem.
#[derive(Clone)]
pub struct FieldFunctions {
    pub initial_solution: Arc<dyn Function>,
    pub right_hand_side: Arc<dyn Function>,
    pub velocity: Arc<dyn Function>,
}

impl Default for FieldFunctions {
    fn default() -> Self {
        FieldFunctions {
            initial_solution: Arc::new(ConstantFunction(0.0)),
            right_hand_side: Arc::new(ConstantFunction(0.0)),
            velocity: Arc::new(ConstantFunction(0.0)),
        }
    }
}

impl FieldFunctions {
    pub fn with_initial_solution(mut self, f: impl Function + 'static) -> Self {
        self.initial_solution = Arc::new(f);
        self
    }

    pub fn with_right_hand_side(mut self, f: impl Function + 'static) -> Self {
        self.right_hand_side = Arc::new(f);
        self
    }

    pub fn with_velocity(mut self, f: impl Function + 'static) -> Self {
        self.velocity = Arc::new(f);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_and_constants() {
        let f = |x: f64, t: f64| x + 2.0 * t;
        assert_eq!(f.value(1.0, 1.0), 3.0);
        assert_eq!(ConstantFunction(4.0).value(0.3, 9.0), 4.0);
        let fields = FieldFunctions::default().with_velocity(ConstantFunction(2.0));
        assert_eq!(fields.velocity.value(0.0, 0.0), 2.0);
        assert_eq!(fields.initial_solution.value(0.0, 0.0), 0.0);
    }

    #[test]
    fn cached_values_default_to_zero() {
        let cached = FunctionCached::new();
        assert_eq!(cached.get(3), 0.0);
        cached.set(3, 1.5);
        assert_eq!(cached.get(3), 1.5);
    }
}
