//! Linear algebra utilities.

use ndarray::Array2;

/// Solve the dense square system Ax = b using Gaussian elimination with
/// partial pivoting.
///
/// The systems solved here (reaction stoichiometry, element-abundance
/// corrections) are small, so a straightforward O(n^3) elimination is used
/// rather than a factorization library.
///
/// # Arguments
/// * `a` - Coefficient matrix (n x n)
/// * `b` - Right-hand side vector (length n)
///
/// # Returns
/// `Some(x)` with the solution vector, or `None` if the matrix is singular
/// to working precision.
///
/// # Panics
/// Panics if `a` is not square or `b` has the wrong length.
///
/// # Example
/// ```
/// use mpequil_core::utils::linear_algebra::gauss_solve;
/// use ndarray::array;
///
/// let a = array![[2.0, 1.0], [1.0, 3.0]];
/// let x = gauss_solve(&a, &[3.0, 5.0]).unwrap();
/// assert!((x[0] - 0.8).abs() < 1e-12);
/// assert!((x[1] - 1.4).abs() < 1e-12);
/// ```
pub fn gauss_solve(a: &Array2<f64>, b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    assert_eq!(a.nrows(), n, "matrix must have one row per equation");
    assert_eq!(a.ncols(), n, "matrix must be square");

    let rhs = Array2::from_shape_fn((n, 1), |(i, _)| b[i]);
    let x = gauss_solve_multi(a, &rhs)?;
    Some(x.column(0).to_vec())
}

/// Solve AX = B for several right-hand sides sharing one elimination.
///
/// # Arguments
/// * `a` - Coefficient matrix (n x n)
/// * `b` - Right-hand side columns (n x m)
///
/// # Returns
/// `Some(X)` (n x m), or `None` if the matrix is singular to working
/// precision.
///
/// # Panics
/// Panics if `a` is not square or the row counts disagree.
pub fn gauss_solve_multi(a: &Array2<f64>, b: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    assert_eq!(a.ncols(), n, "matrix must be square");
    assert_eq!(b.nrows(), n, "right-hand sides must have one row per equation");
    let m = b.ncols();

    if n == 0 {
        return Some(Array2::zeros((0, m)));
    }

    let mut work = a.clone();
    let mut rhs = b.clone();

    // Pivots smaller than this relative to the largest entry are singular.
    let scale = work.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 {
        return None;
    }
    let pivot_tol = 1e-14 * scale;

    // Forward elimination with row pivoting
    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_mag = work[[col, col]].abs();
        for row in col + 1..n {
            let mag = work[[row, col]].abs();
            if mag > pivot_mag {
                pivot_mag = mag;
                pivot_row = row;
            }
        }
        if pivot_mag <= pivot_tol {
            return None;
        }
        if pivot_row != col {
            for j in 0..n {
                work.swap([col, j], [pivot_row, j]);
            }
            for j in 0..m {
                rhs.swap([col, j], [pivot_row, j]);
            }
        }

        let pivot = work[[col, col]];
        for row in col + 1..n {
            let factor = work[[row, col]] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                work[[row, j]] -= factor * work[[col, j]];
            }
            for j in 0..m {
                rhs[[row, j]] -= factor * rhs[[col, j]];
            }
        }
    }

    // Back substitution
    let mut x = Array2::zeros((n, m));
    for j in 0..m {
        for row in (0..n).rev() {
            let mut sum = rhs[[row, j]];
            for col in row + 1..n {
                sum -= work[[row, col]] * x[[col, j]];
            }
            x[[row, j]] = sum / work[[row, row]];
        }
    }

    Some(x)
}
