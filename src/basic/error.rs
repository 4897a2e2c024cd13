//! Error types for network construction and power-flow solving.

use thiserror::Error;

use super::network::BusId;

/// Errors raised while building a network or solving its power flow.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PowerFlowError {
    /// A bad bus reference or a physically invalid parameter.
    #[error("Invalid topology: {what}")]
    InvalidTopology { what: String },

    /// Buses that cannot be reached from the slack bus through any line.
    #[error("Disconnected network: buses {buses:?} are unreachable from the slack bus")]
    DisconnectedNetwork { buses: Vec<BusId> },

    /// The iteration ceiling was reached, or the iterate diverged.
    #[error(
        "Did not converge after {iterations} iterations (max mismatch {max_mismatch_mva:e} MVA)"
    )]
    DidNotConverge {
        iterations: usize,
        max_mismatch_mva: f64,
    },

    #[error("Multiple slack buses: {existing} is already the slack bus, rejected {rejected}")]
    MultipleSlack { existing: BusId, rejected: BusId },

    #[error("Network has no slack bus")]
    NoSlack,

    #[error("Invalid solver configuration: {what}")]
    InvalidConfig { what: String },
}

impl PowerFlowError {
    pub(crate) fn topology(what: impl Into<String>) -> Self {
        PowerFlowError::InvalidTopology { what: what.into() }
    }
}

pub type PfResult<T> = Result<T, PowerFlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_diagnostics() {
        let err = PowerFlowError::DidNotConverge {
            iterations: 20,
            max_mismatch_mva: 0.5,
        };
        let msg = err.to_string();
        assert!(msg.contains("20 iterations"), "{msg}");
        assert!(msg.contains("5e-1"), "{msg}");

        let err = PowerFlowError::DisconnectedNetwork {
            buses: vec![BusId(3)],
        };
        assert!(err.to_string().contains("BusId(3)"));
    }
}
