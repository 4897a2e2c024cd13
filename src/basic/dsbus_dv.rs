use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

/// Computes the partial derivatives of the complex bus power injections with
/// respect to voltage magnitudes and angles.
///
/// With `I = Ybus * V` the entries are
///
/// * `dS_dVm[i][j] = V_i * conj(Y_ij * Vnorm_j) + δ_ij * conj(I_i) * Vnorm_i`
/// * `dS_dVa[i][j] = j * V_i * conj(δ_ij * I_i - Y_ij * V_j)`
///
/// Both matrices share the sparsity pattern of `Ybus`, which must contain
/// every diagonal entry.
///
/// # Notes
///
/// This is the complex matrix formulation from MatPower:
///  R. D. Zimmerman, "AC Power Flows, Generalized OPF Costs and
///  their Derivatives using Complex Matrix Notation", MATPOWER
///  Technical Note 2, February 2010.
#[allow(non_snake_case)]
pub(crate) fn dSbus_dV(
    Ybus: &CscMatrix<Complex64>,
    v: &DVector<Complex64>,
    Vnorm: &DVector<Complex64>,
) -> (CscMatrix<Complex64>, CscMatrix<Complex64>) {
    let ibus = Ybus * v;
    let nnz = Ybus.nnz();
    let mut dvm = Vec::with_capacity(nnz);
    let mut dva = Vec::with_capacity(nnz);

    for (i, j, y) in Ybus.triplet_iter() {
        let mut vm = v[i] * (y * Vnorm[j]).conj();
        let mut va = -(y * v[j]).conj();
        if i == j {
            vm += ibus[i].conj() * Vnorm[i];
            va += ibus[i].conj();
        }
        dvm.push(vm);
        dva.push(Complex64::i() * v[i] * va);
    }

    // one value per stored Ybus entry, in triplet order, so the pattern fits
    let pattern = Ybus.pattern().clone();
    let dS_dVm = CscMatrix::try_from_pattern_and_values(pattern.clone(), dvm)
        .expect("values follow the Ybus pattern");
    let dS_dVa = CscMatrix::try_from_pattern_and_values(pattern, dva)
        .expect("values follow the Ybus pattern");
    (dS_dVm, dS_dVa)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;
    use nalgebra_sparse::CooMatrix;

    fn injections(y: &DMatrix<Complex64>, vm: &[f64], va: &[f64]) -> DVector<Complex64> {
        let v = DVector::from_iterator(
            vm.len(),
            vm.iter().zip(va).map(|(m, a)| Complex64::from_polar(*m, *a)),
        );
        let i = y * &v;
        v.component_mul(&i.conjugate())
    }

    /// Compares the analytic derivatives against central finite differences.
    #[test]
    fn matches_finite_differences() {
        let ys = 1.0 / Complex64::new(0.09, 0.1577);
        let yb = Complex64::new(0.0, 0.02);
        let mut coo = CooMatrix::new(3, 3);
        for (f, t) in [(0, 1), (1, 2)] {
            coo.push(f, f, ys + yb);
            coo.push(t, t, ys + yb);
            coo.push(f, t, -ys);
            coo.push(t, f, -ys);
        }
        let ybus = CscMatrix::from(&coo);
        let dense = DMatrix::from(&ybus);

        let vm = [1.02, 0.98, 0.97];
        let va = [0.0, -0.03, -0.05];
        let v = DVector::from_iterator(3, (0..3).map(|k| Complex64::from_polar(vm[k], va[k])));
        let vnorm = v.map(|e| e / e.norm());
        let (ds_dvm, ds_dva) = dSbus_dV(&ybus, &v, &vnorm);
        let ds_dvm = DMatrix::from(&ds_dvm);
        let ds_dva = DMatrix::from(&ds_dva);

        let h = 1e-6;
        for j in 0..3 {
            let (mut up, mut down) = (vm, vm);
            up[j] += h;
            down[j] -= h;
            let fd = (injections(&dense, &up, &va) - injections(&dense, &down, &va))
                .unscale(2.0 * h);
            for i in 0..3 {
                assert!((fd[i] - ds_dvm[(i, j)]).norm() < 1e-6, "dVm ({i},{j})");
            }

            let (mut up, mut down) = (va, va);
            up[j] += h;
            down[j] -= h;
            let fd = (injections(&dense, &vm, &up) - injections(&dense, &vm, &down))
                .unscale(2.0 * h);
            for i in 0..3 {
                assert!((fd[i] - ds_dva[(i, j)]).norm() < 1e-6, "dVa ({i},{j})");
            }
        }
    }
}
