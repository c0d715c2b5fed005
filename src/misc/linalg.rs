use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

/// Column-major flattening of a matrix, vec(M)
pub fn flatten(m: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_column_slice(m.as_slice())
}

/// Inverse of [`flatten`]
pub fn unflatten(xs: &[f64], nrows: usize, ncols: usize) -> DMatrix<f64> {
    DMatrix::from_column_slice(nrows, ncols, xs)
}

/// (M + Mᵀ) / 2
pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    (m + m.transpose()) * 0.5
}

/// Log-determinant from a Cholesky factorization
pub fn cholesky_ln_det(chol: &Cholesky<f64, Dyn>) -> f64 {
    2.0 * chol.l_dirty().diagonal().iter().map(|x| x.ln()).sum::<f64>()
}

/// Inverse and log-determinant of a symmetric positive definite matrix.
///
/// Returns `None` if the matrix is not positive definite.
///
/// # Example
///
/// ```rust
/// # use beer::misc::spd_inverse;
/// # use nalgebra::DMatrix;
/// let m = DMatrix::from_diagonal_element(2, 2, 4.0);
/// let (inv, ln_det) = spd_inverse(&m).unwrap();
/// assert!((inv[(0, 0)] - 0.25).abs() < 1E-12);
/// assert!((ln_det - 2.0 * 4.0_f64.ln()).abs() < 1E-12);
///
/// assert!(spd_inverse(&(-m)).is_none());
/// ```
pub fn spd_inverse(m: &DMatrix<f64>) -> Option<(DMatrix<f64>, f64)> {
    if !m.is_square() || m.iter().any(|x| !x.is_finite()) {
        return None;
    }
    let chol = symmetrize(m).cholesky()?;
    let ln_det = cholesky_ln_det(&chol);
    Some((symmetrize(&chol.inverse()), ln_det))
}
