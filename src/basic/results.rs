//! Conversion of a converged per-unit state into physical results.
//!
//! This is the only place where per-unit quantities become MW, MVAr, kA and
//! degrees.

use nalgebra::DVector;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::balance::{BalanceReport, verify_balance};
use super::network::{BusId, ExternalGrid, GeneratorId, LineId, LoadId, Network, ShuntId};
use super::system::AdmittanceMatrix;

/// Voltage and net injection of a bus. `p_mw`/`q_mvar` follow the generator
/// convention: positive when the bus feeds power into the lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusResult {
    pub bus: BusId,
    pub vm_pu: f64,
    pub va_degree: f64,
    pub p_mw: f64,
    pub q_mvar: f64,
}

/// Terminal flows of a line. Power entering the line at either end is positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineResult {
    pub line: LineId,
    pub from_bus: BusId,
    pub to_bus: BusId,
    pub p_from_mw: f64,
    pub q_from_mvar: f64,
    pub p_to_mw: f64,
    pub q_to_mvar: f64,
    pub pl_mw: f64,
    pub ql_mvar: f64,
    pub i_from_ka: f64,
    pub i_to_ka: f64,
    pub i_ka: f64,
    /// `i_ka` relative to the thermal limit of all parallel circuits.
    pub loading_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorResult {
    pub generator: GeneratorId,
    pub bus: BusId,
    pub p_mw: f64,
    pub q_mvar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalGridResult {
    pub bus: BusId,
    pub p_mw: f64,
    pub q_mvar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResult {
    pub load: LoadId,
    pub bus: BusId,
    pub p_mw: f64,
    pub q_mvar: f64,
}

/// Power drawn by a shunt at the solved voltage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShuntResult {
    pub shunt: ShuntId,
    pub bus: BusId,
    pub p_mw: f64,
    pub q_mvar: f64,
}

/// Outcome of one power-flow solve, owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    pub converged: bool,
    pub iterations: usize,
    pub max_mismatch_mva: f64,
    pub buses: Vec<BusResult>,
    pub lines: Vec<LineResult>,
    pub generators: Vec<GeneratorResult>,
    pub ext_grid: ExternalGridResult,
    pub loads: Vec<LoadResult>,
    pub shunts: Vec<ShuntResult>,
}

impl SolveResult {
    pub fn bus(&self, id: BusId) -> Option<&BusResult> {
        self.buses.get(id.index())
    }

    pub fn line(&self, id: LineId) -> Option<&LineResult> {
        self.lines.get(id.index())
    }

    /// Checks generation against load plus losses, see [`verify_balance`].
    pub fn verify_balance(&self, tolerance_mva: f64) -> BalanceReport {
        verify_balance(self, tolerance_mva)
    }
}

/// Solver bookkeeping carried into the result.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Convergence {
    pub iterations: usize,
    pub max_mismatch_mva: f64,
}

/// Derives all bus, line and element results from converged voltages `v`.
pub(crate) fn extract_results(
    network: &Network,
    ext: &ExternalGrid,
    ybus: &AdmittanceMatrix,
    v: &DVector<Complex64>,
    convergence: Convergence,
) -> SolveResult {
    let s_base = ybus.s_base;
    let ibus = &ybus.ybus * v;
    let sbus: Vec<Complex64> = v
        .iter()
        .zip(ibus.iter())
        .map(|(v, i)| v * i.conj() * s_base)
        .collect();

    let buses = network
        .buses()
        .iter()
        .map(|bus| {
            let k = bus.id.index();
            BusResult {
                bus: bus.id,
                vm_pu: v[k].norm(),
                va_degree: v[k].arg().to_degrees(),
                p_mw: sbus[k].re,
                q_mvar: sbus[k].im,
            }
        })
        .collect();

    let lines = ybus
        .branches
        .iter()
        .zip(network.lines())
        .map(|(br, line)| {
            let (vf, vt) = (v[br.from.index()], v[br.to.index()]);
            let i_f = br.yff * vf + br.yft * vt;
            let i_t = br.ytf * vf + br.ytt * vt;
            let s_f = vf * i_f.conj() * s_base;
            let s_t = vt * i_t.conj() * s_base;
            let i_from_ka = i_f.norm() * br.base.i_ka();
            let i_to_ka = i_t.norm() * br.base.i_ka();
            let i_ka = i_from_ka.max(i_to_ka);
            let limit_ka = line.params.max_i_ka * line.params.parallel as f64;
            LineResult {
                line: br.line,
                from_bus: br.from,
                to_bus: br.to,
                p_from_mw: s_f.re,
                q_from_mvar: s_f.im,
                p_to_mw: s_t.re,
                q_to_mvar: s_t.im,
                pl_mw: s_f.re + s_t.re,
                ql_mvar: s_f.im + s_t.im,
                i_from_ka,
                i_to_ka,
                i_ka,
                loading_percent: 100.0 * i_ka / limit_ka,
            }
        })
        .collect();

    // local consumption and uncontrolled generation per bus, in MVA
    let nbus = network.buses().len();
    let mut local_load = vec![Complex64::new(0.0, 0.0); nbus];
    for load in network.loads() {
        local_load[load.bus.index()] += Complex64::new(load.p_mw, load.q_mvar);
    }
    let mut fixed_gen = vec![0.0; nbus];
    for g in network.generators().iter().filter(|g| !g.is_voltage_controlled()) {
        fixed_gen[g.bus.index()] += g.p_mw;
    }

    let generators = network
        .generators()
        .iter()
        .map(|g| {
            let k = g.bus.index();
            let q_mvar = if g.is_voltage_controlled() {
                sbus[k].im + local_load[k].im
            } else {
                0.0
            };
            GeneratorResult {
                generator: g.id,
                bus: g.bus,
                p_mw: g.p_mw,
                q_mvar,
            }
        })
        .collect();

    let k = ext.bus.index();
    let ext_grid = ExternalGridResult {
        bus: ext.bus,
        p_mw: sbus[k].re + local_load[k].re - fixed_gen[k],
        q_mvar: sbus[k].im + local_load[k].im,
    };

    let loads = network
        .loads()
        .iter()
        .map(|l| LoadResult {
            load: l.id,
            bus: l.bus,
            p_mw: l.p_mw,
            q_mvar: l.q_mvar,
        })
        .collect();

    let shunts = network
        .shunts()
        .iter()
        .map(|sh| {
            let vm2 = v[sh.bus.index()].norm_sqr();
            ShuntResult {
                shunt: sh.id,
                bus: sh.bus,
                p_mw: sh.p_mw * vm2,
                q_mvar: sh.q_mvar * vm2,
            }
        })
        .collect();

    SolveResult {
        converged: true,
        iterations: convergence.iterations,
        max_mismatch_mva: convergence.max_mismatch_mva,
        buses,
        lines,
        generators,
        ext_grid,
        loads,
        shunts,
    }
}
