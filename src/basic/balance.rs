use serde::{Deserialize, Serialize};

use super::results::SolveResult;

/// Aggregates of one power component (active in MW or reactive in MVAr).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceTotals {
    /// Generators plus external grid.
    pub generation: f64,
    /// Loads plus shunt consumption.
    pub load: f64,
    /// Sum over all lines of the power entering both ends.
    pub losses: f64,
    /// `generation - (load + losses)`.
    pub imbalance: f64,
    pub passed: bool,
}

impl BalanceTotals {
    fn new(generation: f64, load: f64, losses: f64, tolerance: f64) -> Self {
        let imbalance = generation - (load + losses);
        Self {
            generation,
            load,
            losses,
            imbalance,
            passed: imbalance.abs() < tolerance,
        }
    }
}

/// Power balance of a solved network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub active: BalanceTotals,
    pub reactive: BalanceTotals,
    pub tolerance_mva: f64,
}

impl BalanceReport {
    /// True when both the active and the reactive balance hold.
    pub fn passed(&self) -> bool {
        self.active.passed && self.reactive.passed
    }
}

/// Checks that generation equals load plus line losses within
/// `tolerance_mva`, separately for active and reactive power.
pub fn verify_balance(result: &SolveResult, tolerance_mva: f64) -> BalanceReport {
    let gen_p = result.generators.iter().map(|g| g.p_mw).sum::<f64>() + result.ext_grid.p_mw;
    let gen_q = result.generators.iter().map(|g| g.q_mvar).sum::<f64>() + result.ext_grid.q_mvar;

    let load_p = result.loads.iter().map(|l| l.p_mw).sum::<f64>()
        + result.shunts.iter().map(|s| s.p_mw).sum::<f64>();
    let load_q = result.loads.iter().map(|l| l.q_mvar).sum::<f64>()
        + result.shunts.iter().map(|s| s.q_mvar).sum::<f64>();

    let loss_p = result.lines.iter().map(|l| l.pl_mw).sum::<f64>();
    let loss_q = result.lines.iter().map(|l| l.ql_mvar).sum::<f64>();

    BalanceReport {
        active: BalanceTotals::new(gen_p, load_p, loss_p, tolerance_mva),
        reactive: BalanceTotals::new(gen_q, load_q, loss_q, tolerance_mva),
        tolerance_mva,
    }
}
