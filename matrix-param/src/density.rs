//! Gamma log density over scalar (prior) or matrix (posterior)
//! operands.
//!
//! ```text
//! log Gamma(x | a, b) = a ln(b) + (a - 1) ln(x) - b x - lgamma(a)
//! ```

use ndarray::ArrayView2;
use special::Gamma as SpecialGamma;

/// Shape or rate operand: one value shared by every cell, or one
/// value per cell
#[derive(Clone, Copy, Debug)]
pub enum GammaArg<'a> {
    Scalar(f64),
    Matrix(ArrayView2<'a, f64>),
}

impl GammaArg<'_> {
    #[inline]
    fn at(&self, ij: (usize, usize)) -> f64 {
        match self {
            GammaArg::Scalar(x) => *x,
            GammaArg::Matrix(m) => m[ij],
        }
    }
}

/// Sum of Gamma log densities of every cell of `x`
///
/// * `x` - positive values
/// * `a` - shape, scalar or matrix of the same shape as `x`
/// * `b` - rate, scalar or matrix of the same shape as `x`
pub fn log_gamma_density<'a>(x: ArrayView2<f64>, a: GammaArg<'a>, b: GammaArg<'a>) -> f64 {
    for arg in [&a, &b] {
        if let GammaArg::Matrix(m) = arg {
            assert_eq!(m.dim(), x.dim(), "gamma parameters must match x");
        }
    }

    x.indexed_iter()
        .map(|(ij, &x_ij)| {
            let a_ij = a.at(ij);
            let b_ij = b.at(ij);
            a_ij * b_ij.ln() + (a_ij - 1.0) * x_ij.ln() - b_ij * x_ij - SpecialGamma::ln_gamma(a_ij).0
        })
        .sum()
}
