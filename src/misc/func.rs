use crate::consts::LN_PI;
use nalgebra::{DMatrix, DVector};
use special::Gamma;
use std::fmt::Debug;

/// Convert a Vector to a printable string
///
/// # Example
///
/// ```rust
/// # use beer::misc::vec_to_string;
/// let xs: Vec<u8> = vec![0, 1, 2, 3, 4, 5];
///
/// assert_eq!(vec_to_string(&xs, 6).as_str(), "[0, 1, 2, 3, 4, 5]");
/// assert_eq!(vec_to_string(&xs, 5).as_str(), "[0, 1, 2, 3, ... , 5]");
///
/// ```
pub fn vec_to_string<T: Debug>(xs: &[T], max_entries: usize) -> String {
    let mut out = String::new();
    out += "[";
    let n = xs.len();
    xs.iter().enumerate().for_each(|(i, x)| {
        let to_push = if i + 1 == n {
            format!("{:?}", x)
        } else if i < max_entries - 1 {
            format!("{:?}, ", x)
        } else if i == max_entries - 1 {
            String::from("... , ")
        } else {
            String::new()
        };

        out.push_str(to_push.as_str());
    });
    out += "]";

    out
}

/// Safely compute `log(sum(exp(xs))`
///
/// Returns negative infinity for an empty slice or when every entry is
/// negative infinity.
///
/// # Example
///
/// ```rust
/// # use beer::misc::logsumexp;
/// let xs = vec![0.5_f64.ln(), 0.25_f64.ln(), 0.25_f64.ln()];
/// assert!(logsumexp(&xs).abs() < 1E-12);
/// ```
pub fn logsumexp(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        f64::NEG_INFINITY
    } else if xs.len() == 1 {
        xs[0]
    } else {
        let maxval = xs.iter().fold(f64::NEG_INFINITY, |acc, &x| acc.max(x));
        if maxval == f64::NEG_INFINITY {
            return f64::NEG_INFINITY;
        }

        xs.iter().fold(0.0, |acc, x| acc + (x - maxval).exp()).ln() + maxval
    }
}

/// Row-wise [`logsumexp`] of a matrix.
pub fn logsumexp_rows(xs: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(
        xs.nrows(),
        xs.row_iter().map(|row| {
            let row: Vec<f64> = row.iter().copied().collect();
            logsumexp(&row)
        }),
    )
}

/// Probabilities from un-normalized log-probabilities
///
/// # Example
///
/// ```rust
/// # use beer::misc::softmax;
/// # use nalgebra::DVector;
/// let p = softmax(&DVector::from_vec(vec![0.0, 0.0]));
/// assert!((p[0] - 0.5).abs() < 1E-12);
/// ```
pub fn softmax(xs: &DVector<f64>) -> DVector<f64> {
    let lse = logsumexp(xs.as_slice());
    xs.map(|x| (x - lse).exp())
}

/// Natural logarithm of the multivariate gamma function, *ln Γ<sub>p</sub>(a)*.
///
/// # Arguments
///
/// * `p` - Positive integer degrees of freedom
/// * `a` - The number for which to compute the multivariate gamma
pub fn lnmv_gamma(p: usize, a: f64) -> f64 {
    let pf = p as f64;
    let a0 = pf * (pf - 1.0) / 4.0 * LN_PI;
    (1..=p).fold(a0, |acc, j| acc + (a + (1.0 - j as f64) / 2.0).ln_gamma().0)
}

/// Multivariate digamma function, the derivative of [`lnmv_gamma`] with
/// respect to `a`.
pub fn mv_digamma(p: usize, a: f64) -> f64 {
    (1..=p).fold(0.0, |acc, j| acc + (a + (1.0 - j as f64) / 2.0).digamma())
}

/// Natural logarithm of the gamma function
#[inline]
pub fn ln_gamma(x: f64) -> f64 {
    x.ln_gamma().0
}

/// The digamma function, ψ(x)
#[inline]
pub fn digamma(x: f64) -> f64 {
    x.digamma()
}
