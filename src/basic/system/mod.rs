pub mod admittance;
pub(crate) mod topology;

pub use admittance::{build_admittance, AdmittanceMatrix, BranchAdmittance};
