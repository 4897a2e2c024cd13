use faer::{
    MatMut,
    linalg::solvers::Solve,
    sparse::{
        SparseColMatRef, SymbolicSparseColMatRef,
        linalg::solvers::{Lu, SymbolicLu},
    },
};

use super::Solve as PfSolve;

/// Sparse LU from `faer`, caching the symbolic factorisation.
#[derive(Default)]
pub struct FaerSolver {
    symbolic: Option<SymbolicLu<usize>>,
}

#[allow(non_snake_case)]
impl PfSolve for FaerSolver {
    fn solve(
        &mut self,
        Ap: &[usize],
        Ai: &[usize],
        Ax: &[f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str> {
        if Ap.len() != n + 1 || b.len() != n || Ai.len() != Ax.len() {
            return Err("dimension mismatch");
        }
        // SAFETY: callers hand over the sorted, in-bounds pattern of a CscMatrix.
        let s = unsafe { SymbolicSparseColMatRef::new_unchecked(n, n, Ap, None, Ai) };
        let mat = SparseColMatRef::new(s, Ax);
        if self.symbolic.is_none() {
            self.symbolic = Some(SymbolicLu::try_new(s).map_err(|_| "Faer symbolic error")?);
        }
        let symbolic = self.symbolic.clone().ok_or("Faer symbolic error")?;
        let lu = Lu::try_new_with_symbolic(symbolic, mat).map_err(|_| "Faer numerical error")?;
        let rhs = MatMut::from_column_major_slice_mut(b, n, 1);
        lu.solve_in_place(rhs);
        Ok(())
    }

    fn reset(&mut self) {
        self.symbolic = None;
    }
}
