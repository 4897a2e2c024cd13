mod dense;
pub use dense::*;

#[cfg(feature = "faer")]
mod faer;
#[cfg(feature = "faer")]
pub use faer::*;

#[cfg(feature = "rsparse")]
mod rsparse;
#[cfg(feature = "rsparse")]
pub use rsparse::*;

#[cfg(feature = "faer")]
pub type DefaultSolver = FaerSolver;

#[cfg(all(not(feature = "faer"), feature = "rsparse"))]
pub type DefaultSolver = RSparseSolver;

#[cfg(all(not(feature = "faer"), not(feature = "rsparse")))]
pub type DefaultSolver = DenseLuSolver;

#[allow(non_snake_case)]
/// A trait for solving the square sparse linear systems of a Newton step.
///
/// A solver instance is tied to one sparsity pattern: it may cache the
/// symbolic analysis of the first matrix it sees until [`Solve::reset`].
pub trait Solve {
    /// Solves `A x = b` in place, `A` given in compressed sparse column form.
    ///
    /// # Parameters
    ///
    /// * `Ap` - Column pointers of the matrix.
    /// * `Ai` - Row indices of the matrix.
    /// * `Ax` - Non-zero values of the matrix.
    /// * `b` - Right-hand side vector, overwritten with the solution.
    /// * `n` - Dimension of the system.
    ///
    /// # Returns
    ///
    /// A result indicating success or failure, e.g. a singular matrix.
    fn solve(
        &mut self,
        Ap: &[usize],
        Ai: &[usize],
        Ax: &[f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str>;

    /// Drops any cached analysis so the next call may use a new pattern.
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// [[4, 1, 0], [1, 3, 1], [0, 1, 2]] in CSC form; x = [1, 2, 3].
    fn system() -> (Vec<usize>, Vec<usize>, Vec<f64>, Vec<f64>) {
        let ap = vec![0, 2, 5, 7];
        let ai = vec![0, 1, 0, 1, 2, 1, 2];
        let ax = vec![4.0, 1.0, 1.0, 3.0, 1.0, 1.0, 2.0];
        let b = vec![6.0, 10.0, 8.0];
        (ap, ai, ax, b)
    }

    fn check<S: Solve>(solver: &mut S) {
        let (ap, ai, ax, mut b) = system();
        solver.solve(&ap, &ai, &ax, &mut b, 3).unwrap();
        for (x, expected) in b.iter().zip([1.0, 2.0, 3.0]) {
            assert!((x - expected).abs() < 1e-12, "{b:?}");
        }
        // second call reuses the cached analysis
        let (ap, ai, ax, mut b) = system();
        solver.solve(&ap, &ai, &ax, &mut b, 3).unwrap();
        assert!((b[2] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn dense_solver() {
        check(&mut DenseLuSolver::default());
    }

    #[cfg(feature = "rsparse")]
    #[test]
    fn rsparse_solver() {
        check(&mut RSparseSolver::default());
    }

    #[cfg(feature = "faer")]
    #[test]
    fn faer_solver() {
        check(&mut FaerSolver::default());
    }

    #[test]
    fn default_solver() {
        check(&mut DefaultSolver::default());
    }

    #[test]
    fn singular_matrix_is_an_error() {
        let ap = vec![0, 2, 4];
        let ai = vec![0, 1, 0, 1];
        let ax = vec![1.0, 2.0, 2.0, 4.0];
        let mut b = vec![1.0, 1.0];
        assert!(DenseLuSolver::default().solve(&ap, &ai, &ax, &mut b, 2).is_err());
    }
}
