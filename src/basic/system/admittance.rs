use std::f64::consts::PI;

use nalgebra::{Complex, DMatrix};
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;
use num_traits::Zero;
use tracing::debug;

use super::topology::unreachable_buses;
use crate::basic::error::{PfResult, PowerFlowError};
use crate::basic::network::{BusId, Line, LineId, Network};
use crate::basic::units::PerUnitBase;

/// Per-unit π-equivalent two-port of one line.
///
/// The currents injected into the line at its terminals are
/// `i_from = yff * v_from + yft * v_to` and `i_to = ytf * v_from + ytt * v_to`.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchAdmittance {
    pub line: LineId,
    pub from: BusId,
    pub to: BusId,
    pub yff: Complex64,
    pub yft: Complex64,
    pub ytf: Complex64,
    pub ytt: Complex64,
    pub(crate) base: PerUnitBase,
}

impl BranchAdmittance {
    fn from_line(line: &Line, vn_kv: f64, s_base: f64, w_base: f64) -> Self {
        let base = PerUnitBase::new(s_base, vn_kv);
        let p = &line.params;
        let z_base = base.z_ohm();
        let y_series = 1.0 / (Complex::new(p.r_ohm(), p.x_ohm()) / z_base);

        let circuits = p.length_km * p.parallel as f64;
        let g = p.g_us_per_km * 1e-6 * circuits;
        let b = w_base * p.c_nf_per_km * 1e-9 * circuits;
        let half_shunt = 0.5 * Complex::new(g, b) * z_base;

        Self {
            line: line.id,
            from: line.from_bus,
            to: line.to_bus,
            yff: y_series + half_shunt,
            yft: -y_series,
            ytf: -y_series,
            ytt: y_series + half_shunt,
            base,
        }
    }
}

/// Complex bus admittance matrix in bus-id order, together with the line
/// two-ports it was stamped from.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmittanceMatrix {
    pub(crate) ybus: CscMatrix<Complex64>,
    pub(crate) branches: Vec<BranchAdmittance>,
    pub(crate) s_base: f64,
}

impl AdmittanceMatrix {
    pub fn nbus(&self) -> usize {
        self.ybus.nrows()
    }

    /// Entry `Y[i][j]` in per unit; zero for unconnected pairs.
    pub fn get(&self, i: BusId, j: BusId) -> Complex64 {
        self.ybus
            .get_entry(i.index(), j.index())
            .map(|e| e.into_value())
            .unwrap_or_else(Complex64::zero)
    }

    pub fn sparse(&self) -> &CscMatrix<Complex64> {
        &self.ybus
    }

    pub fn branches(&self) -> &[BranchAdmittance] {
        &self.branches
    }

    pub fn to_dense(&self) -> DMatrix<Complex64> {
        DMatrix::from(&self.ybus)
    }
}

/// Builds the per-unit bus admittance matrix of `network` on `s_base` MVA.
///
/// Every bus must be reachable from the slack bus.
pub fn build_admittance(network: &Network, s_base: f64) -> PfResult<AdmittanceMatrix> {
    let slack = network.slack_bus().ok_or(PowerFlowError::NoSlack)?;
    let unreachable = unreachable_buses(network, slack);
    if !unreachable.is_empty() {
        return Err(PowerFlowError::DisconnectedNetwork { buses: unreachable });
    }

    let nbus = network.buses().len();
    let w_base = 2.0 * PI * network.f_hz();
    let branches: Vec<_> = network
        .lines()
        .iter()
        .map(|line| {
            let vn_kv = network.buses()[line.from_bus.index()].vn_kv;
            BranchAdmittance::from_line(line, vn_kv, s_base, w_base)
        })
        .collect();

    let mut coo = CooMatrix::new(nbus, nbus);
    coo.reserve(nbus + 4 * branches.len() + network.shunts().len());
    // keep every diagonal in the pattern so the Jacobian structure is fixed
    for i in 0..nbus {
        coo.push(i, i, Complex64::zero());
    }
    for br in &branches {
        let (f, t) = (br.from.index(), br.to.index());
        coo.push(f, f, br.yff);
        coo.push(f, t, br.yft);
        coo.push(t, f, br.ytf);
        coo.push(t, t, br.ytt);
    }
    for shunt in network.shunts() {
        // consumption S = |V|^2 conj(y) at 1 p.u.
        let y = Complex::new(shunt.p_mw, -shunt.q_mvar) / s_base;
        coo.push(shunt.bus.index(), shunt.bus.index(), y);
    }

    let ybus = CscMatrix::from(&coo);
    debug!(buses = nbus, lines = branches.len(), nnz = ybus.nnz(), "built admittance matrix");

    Ok(AdmittanceMatrix {
        ybus,
        branches,
        s_base,
    })
}
