use serde::{Deserialize, Serialize};

use super::error::{PfResult, PowerFlowError};

/// Solver settings.
///
/// Missing fields take their defaults when deserialised, so a caller may
/// override only the tolerance, e.g. `{"tolerance_mva": 1e-6}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Largest accepted active or reactive mismatch at any bus (MVA).
    pub tolerance_mva: f64,
    /// Number of Newton updates after which the solve gives up.
    pub max_iterations: usize,
    /// Common power base of the per-unit system (MVA).
    pub base_mva: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance_mva: 1e-3,
            max_iterations: 20,
            base_mva: 1.0,
        }
    }
}

impl SolverConfig {
    pub fn with_tolerance(mut self, tolerance_mva: f64) -> Self {
        self.tolerance_mva = tolerance_mva;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_base_mva(mut self, base_mva: f64) -> Self {
        self.base_mva = base_mva;
        self
    }

    /// Tolerance expressed on the per-unit power base.
    pub(crate) fn tolerance_pu(&self) -> f64 {
        self.tolerance_mva / self.base_mva
    }

    pub(crate) fn validate(&self) -> PfResult<()> {
        if !(self.tolerance_mva.is_finite() && self.tolerance_mva > 0.0) {
            return Err(PowerFlowError::InvalidConfig {
                what: format!("tolerance_mva must be positive, got {}", self.tolerance_mva),
            });
        }
        if !(self.base_mva.is_finite() && self.base_mva > 0.0) {
            return Err(PowerFlowError::InvalidConfig {
                what: format!("base_mva must be positive, got {}", self.base_mva),
            });
        }
        Ok(())
    }
}
