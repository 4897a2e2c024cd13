use rsparse::{
    data::{self, Numeric, Symb},
    lsolve, lu, sqr, usolve,
};

use super::Solve;

/// Sparse LU from `rsparse`. The fill-reducing ordering is computed once and
/// reused while the pattern stays the same.
#[derive(Default)]
pub struct RSparseSolver {
    symbolic: Option<Symb>,
}

#[allow(non_snake_case)]
impl Solve for RSparseSolver {
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
        let a = data::Sprs {
            m: n,
            n,
            i: Ai.to_vec(),
            p: Ap.iter().map(|&v| v as isize).collect(),
            x: Ax.to_vec(),
            nzmax: Ax.len(),
        };
        let symbolic = self.symbolic.get_or_insert_with(|| sqr(&a, 1, false));
        let numeric = lu(&a, symbolic, 1e-6).map_err(|_| "LU factorization failed")?;

        let mut x = vec![0.0; n];
        ipvec(&numeric.pinv, b, &mut x); // x = P*b
        lsolve(&numeric.l, &mut x); // x = L\x
        usolve(&numeric.u, &mut x); // x = U\x
        ipvec(&symbolic.q, &x, b); // b = Q*x
        Ok(())
    }

    fn reset(&mut self) {
        self.symbolic = None;
    }
}

fn ipvec<T: Numeric<T>>(p: &Option<Vec<isize>>, b: &[T], x: &mut [T]) {
    match p {
        Some(pvec) => {
            for k in 0..b.len() {
                x[pvec[k] as usize] = b[k];
            }
        }
        None => x.copy_from_slice(b),
    }
}
