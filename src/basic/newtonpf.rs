use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;
use tracing::{debug, info, warn};

use super::{
    config::SolverConfig,
    dsbus_dv::dSbus_dV,
    error::{PfResult, PowerFlowError},
    solver::Solve,
};

/// Converged state of a Newton-Raphson run.
#[derive(Debug, Clone)]
pub(crate) struct NewtonOutcome {
    pub v: DVector<Complex64>,
    pub iterations: usize,
    /// Largest |ΔP| or |ΔQ| of the final iterate, in MVA.
    pub max_mismatch_mva: f64,
}

/// Positions of the bus quantities inside the state vector
/// `[Va(pv), Va(pq), Vm(pq)]`.
struct StateIndex {
    pvpq: Vec<usize>,
    pq: Vec<usize>,
    angle: Vec<Option<usize>>,
    magnitude: Vec<Option<usize>>,
}

impl StateIndex {
    fn new(nbus: usize, pv: &[usize], pq: &[usize]) -> Self {
        let pvpq: Vec<usize> = pv.iter().chain(pq).copied().collect();
        let mut angle = vec![None; nbus];
        let mut magnitude = vec![None; nbus];
        for (k, &bus) in pvpq.iter().enumerate() {
            angle[bus] = Some(k);
        }
        for (k, &bus) in pq.iter().enumerate() {
            magnitude[bus] = Some(pvpq.len() + k);
        }
        Self {
            pvpq,
            pq: pq.to_vec(),
            angle,
            magnitude,
        }
    }

    fn len(&self) -> usize {
        self.pvpq.len() + self.pq.len()
    }
}

/// Solves the polar power-mismatch equations `V .* conj(Ybus V) = Sbus`.
///
/// `v_init` carries the fixed slack voltage and PV magnitudes; angles of all
/// `pv`/`pq` buses and magnitudes of `pq` buses are iterated. The state is
/// accepted once the summed |ΔP| and |ΔQ| over all equations is below the
/// tolerance. The returned iteration count is the number of Newton updates
/// applied.
#[allow(non_snake_case)]
pub(crate) fn newton_pf<Solver: Solve>(
    Ybus: &CscMatrix<Complex64>,
    Sbus: &DVector<Complex64>,
    v_init: &DVector<Complex64>,
    pv: &[usize],
    pq: &[usize],
    config: &SolverConfig,
    solver: &mut Solver,
) -> PfResult<NewtonOutcome> {
    let idx = StateIndex::new(v_init.len(), pv, pq);
    let n_ang = idx.pvpq.len();
    let tol = config.tolerance_pu();

    let mut v = v_init.clone();
    let mut v_m = v.map(|e| e.norm());
    let mut v_a = v.map(|e| e.arg());
    let mut F = DVector::zeros(idx.len());
    let mut iterations = 0;

    solver.reset();
    loop {
        let mis = v.component_mul(&(Ybus * &v).conjugate()) - Sbus;
        assemble_f(&mut F, &mis, &idx);
        let worst = max_abs(&F);
        let worst_mva = worst * config.base_mva;
        // bounds the residual active and reactive imbalance of the whole network
        let total = sum_abs(&F);
        debug!(
            iteration = iterations,
            max_mismatch_mva = worst_mva,
            total_mismatch_mva = total * config.base_mva,
            "newton step"
        );

        if total < tol {
            info!(iterations, max_mismatch_mva = worst_mva, "power flow converged");
            return Ok(NewtonOutcome {
                v,
                iterations,
                max_mismatch_mva: worst_mva,
            });
        }
        let diverged = !total.is_finite();
        if diverged || iterations >= config.max_iterations {
            warn!(
                iterations,
                max_mismatch_mva = worst_mva,
                diverged,
                "power flow did not converge"
            );
            return Err(PowerFlowError::DidNotConverge {
                iterations,
                max_mismatch_mva: worst_mva,
            });
        }

        let (dS_dVm, dS_dVa) = dSbus_dV(Ybus, &v, &v.map(|e| e / e.norm()));
        let jacobian = build_jacobian(&dS_dVm, &dS_dVa, &idx);
        let n = jacobian.nrows();
        let (Ap, Ai, Ax) = jacobian.disassemble();
        let solved = solver.solve(&Ap, &Ai, &Ax, F.as_mut_slice(), n);
        if let Err(reason) = solved {
            warn!(iterations, reason, "jacobian solve failed");
            return Err(PowerFlowError::DidNotConverge {
                iterations,
                max_mismatch_mva: worst_mva,
            });
        }

        // F now holds the correction dx
        for (k, &bus) in idx.pvpq.iter().enumerate() {
            v_a[bus] -= F[k];
        }
        for (k, &bus) in idx.pq.iter().enumerate() {
            v_m[bus] -= F[n_ang + k];
        }
        v.zip_zip_apply(&v_m, &v_a, |e, vm, va| *e = Complex64::from_polar(vm, va));
        iterations += 1;
    }
}

/// Sum of absolute entries; any non-finite entry makes the result infinite.
fn sum_abs(f: &DVector<f64>) -> f64 {
    f.iter().fold(0.0_f64, |s, x| {
        if x.is_finite() {
            s + x.abs()
        } else {
            f64::INFINITY
        }
    })
}

/// Largest absolute entry; any non-finite entry makes the result infinite.
fn max_abs(f: &DVector<f64>) -> f64 {
    f.iter().fold(0.0_f64, |m, x| {
        if x.is_finite() {
            m.max(x.abs())
        } else {
            f64::INFINITY
        }
    })
}

#[inline(always)]
fn assemble_f(f: &mut DVector<f64>, mis: &DVector<Complex64>, idx: &StateIndex) {
    let n_ang = idx.pvpq.len();
    for (k, &bus) in idx.pvpq.iter().enumerate() {
        f[k] = mis[bus].re;
    }
    for (k, &bus) in idx.pq.iter().enumerate() {
        f[n_ang + k] = mis[bus].im;
    }
}

/// Assembles
///
/// ```text
/// J = | dP/dVa  dP/dVm |
///     | dQ/dVa  dQ/dVm |
/// ```
///
/// restricted to the rows and columns of the state vector.
#[allow(non_snake_case)]
fn build_jacobian(
    dS_dVm: &CscMatrix<Complex64>,
    dS_dVa: &CscMatrix<Complex64>,
    idx: &StateIndex,
) -> CscMatrix<f64> {
    let n = idx.len();
    let mut coo = CooMatrix::new(n, n);
    coo.reserve(2 * (dS_dVa.nnz() + dS_dVm.nnz()));
    for (i, j, ds) in dS_dVa.triplet_iter() {
        if let Some(col) = idx.angle[j] {
            if let Some(row) = idx.angle[i] {
                coo.push(row, col, ds.re);
            }
            if let Some(row) = idx.magnitude[i] {
                coo.push(row, col, ds.im);
            }
        }
    }
    for (i, j, ds) in dS_dVm.triplet_iter() {
        if let Some(col) = idx.magnitude[j] {
            if let Some(row) = idx.angle[i] {
                coo.push(row, col, ds.re);
            }
            if let Some(row) = idx.magnitude[i] {
                coo.push(row, col, ds.im);
            }
        }
    }
    CscMatrix::from(&coo)
}
