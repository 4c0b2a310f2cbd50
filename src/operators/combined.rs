//! Combined operator `s·M + C + D + R` of the implicit linear systems.

use bitflags::bitflags;

use crate::error::DgError;
use crate::fe::DofSpace;
use crate::operators::convective::ConvectiveKernel;
use crate::operators::diffusive::DiffusiveKernel;
use crate::operators::integrator::CellKernel;
use crate::operators::mass::MassKernel;
use crate::operators::reaction::ReactionKernel;
use crate::operators::Operator;

bitflags! {
    /// Terms active in a [`CombinedOperator`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Terms: u8 {
        const MASS = 1 << 0;
        const CONVECTION = 1 << 1;
        const DIFFUSION = 1 << 2;
        const REACTION = 1 << 3;
    }
}

/// Sum of the unsteady, convective, diffusive and (linearized) reaction terms.
///
/// The mass term is scaled with `scaling_factor_mass` of the operator context.
#[derive(Clone)]
pub struct CombinedOperator {
    space: DofSpace,
    terms: Terms,
    mass: MassKernel,
    convective: Option<ConvectiveKernel>,
    diffusive: Option<DiffusiveKernel>,
    reaction: Option<ReactionKernel>,
}

impl std::fmt::Debug for CombinedOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedOperator").field("terms", &self.terms).field("space", &self.space).finish()
    }
}

impl CombinedOperator {
    /// Fails when a requested term has no kernel.
    pub fn new(
        space: DofSpace,
        terms: Terms,
        convective: Option<ConvectiveKernel>,
        diffusive: Option<DiffusiveKernel>,
        reaction: Option<ReactionKernel>,
    ) -> Result<Self, DgError> {
        let op = CombinedOperator { space, terms, mass: MassKernel, convective, diffusive, reaction };
        let missing = terms - op.available_terms();
        if !missing.is_empty() {
            return Err(DgError::Config(format!("combined operator is missing kernels for {missing:?}")));
        }
        if terms.is_empty() {
            return Err(DgError::Config("combined operator has no active term".to_string()));
        }
        Ok(op)
    }

    fn available_terms(&self) -> Terms {
        let mut available = Terms::MASS;
        available.set(Terms::CONVECTION, self.convective.is_some());
        available.set(Terms::DIFFUSION, self.diffusive.is_some());
        available.set(Terms::REACTION, self.reaction.is_some());
        available
    }

    pub fn terms(&self) -> Terms {
        self.terms
    }

    pub fn unsteady_problem(&self) -> bool {
        self.terms.contains(Terms::MASS)
    }

    pub fn convective_problem(&self) -> bool {
        self.terms.contains(Terms::CONVECTION)
    }

    pub fn diffusive_problem(&self) -> bool {
        self.terms.contains(Terms::DIFFUSION)
    }

    pub fn reaction_problem(&self) -> bool {
        self.terms.contains(Terms::REACTION)
    }

    pub fn convective_kernel(&self) -> Option<&ConvectiveKernel> {
        self.convective.as_ref().filter(|_| self.terms.contains(Terms::CONVECTION))
    }

    /// Same physics on another space (a multigrid level), keeping only `terms`.
    pub fn restricted(&self, space: DofSpace, terms: Terms) -> Result<Self, DgError> {
        CombinedOperator::new(
            space,
            terms & self.terms,
            self.convective.clone(),
            self.diffusive.clone(),
            self.reaction,
        )
    }
}

impl Operator for CombinedOperator {
    fn space(&self) -> &DofSpace {
        &self.space
    }

    fn kernels(&self) -> Vec<&dyn CellKernel> {
        let mut kernels: Vec<&dyn CellKernel> = Vec::with_capacity(4);
        if self.terms.contains(Terms::MASS) {
            kernels.push(&self.mass);
        }
        if let (true, Some(k)) = (self.terms.contains(Terms::CONVECTION), &self.convective) {
            kernels.push(k);
        }
        if let (true, Some(k)) = (self.terms.contains(Terms::DIFFUSION), &self.diffusive) {
            kernels.push(k);
        }
        if let (true, Some(k)) = (self.terms.contains(Terms::REACTION), &self.reaction) {
            kernels.push(k);
        }
        kernels
    }

    fn update_after_mesh_movement(&mut self, space: &DofSpace) {
        self.space = space.clone();
    }
}
