//! Steady-state AC power flow for low-voltage networks.
//!
//! Build a [`Network`](prelude::Network) through its construction API, then
//! call [`solve`](prelude::solve) to run a Newton-Raphson power flow.
mod basic;
pub mod testcases;
pub mod prelude {
    use crate::basic;
    pub use basic::*;

    pub use balance::{BalanceReport, BalanceTotals, verify_balance};
    pub use config::SolverConfig;
    pub use error::{PfResult, PowerFlowError};
    pub use network::*;
    pub use powerflow::{RunPF, solve, solve_with};
    pub use results::*;
    pub use solver::{DefaultSolver, DenseLuSolver, Solve};
    pub use system::{AdmittanceMatrix, BranchAdmittance, build_admittance};
}
