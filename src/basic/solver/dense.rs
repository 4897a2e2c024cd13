use nalgebra::{DMatrix, DVector};

use super::Solve;

/// Dense LU with partial pivoting, for networks small enough that sparsity
/// does not pay off.
#[derive(Default)]
pub struct DenseLuSolver;

#[allow(non_snake_case)]
impl Solve for DenseLuSolver {
    fn solve(
        &mut self,
        Ap: &[usize],
        Ai: &[usize],
        Ax: &[f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str> {
        if Ap.len() != n + 1 || b.len() != n {
            return Err("dimension mismatch");
        }
        let mut a = DMatrix::zeros(n, n);
        for col in 0..n {
            for k in Ap[col]..Ap[col + 1] {
                a[(Ai[k], col)] += Ax[k];
            }
        }
        let rhs = DVector::from_column_slice(b);
        let x = a.lu().solve(&rhs).ok_or("singular matrix")?;
        b.copy_from_slice(x.as_slice());
        Ok(())
    }

    fn reset(&mut self) {}
}
