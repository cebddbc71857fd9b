extern crate special;

use crate::density::{log_gamma_density, GammaArg};
use crate::traits::*;
use ndarray::prelude::*;

pub struct GammaMatrix {
    num_rows: usize,
    num_columns: usize,
    //////////////////////
    // hyper parameters //
    //////////////////////
    a0: f64,
    b0: f64,
    ///////////////////////////
    // sufficient statistics //
    ///////////////////////////
    a_stat: Array2<f64>,
    b_stat: Array2<f64>,
    // shape after the last moving-average step (stochastic mode only)
    a_prev: Option<Array2<f64>>,
    //////////////////////////
    // estimated parameters //
    //////////////////////////
    estimated_mean: Array2<f64>,
    estimated_log_mean: Array2<f64>,
}

impl GammaMatrix {
    /// `Σ log Gamma(mean | a, b)` under the current variational
    /// posterior
    pub fn log_q(&self) -> f64 {
        log_gamma_density(
            self.estimated_mean.view(),
            GammaArg::Matrix(self.a_stat.view()),
            GammaArg::Matrix(self.b_stat.view()),
        )
    }

    /// `Σ log Gamma(mean | a0, b0)` under the prior
    pub fn log_prior(&self) -> f64 {
        log_gamma_density(
            self.estimated_mean.view(),
            GammaArg::Scalar(self.a0),
            GammaArg::Scalar(self.b0),
        )
    }
}

impl TwoStatParam for GammaMatrix {
    type Mat = Array2<f64>;
    type Scalar = f64;

    /// New Poisson-Gamma parameter matrix
    ///
    /// x[i,j] ~ Poisson(lambda[i,j])
    /// lambda[i,j] ~ Gamma(a0, b0)
    ///
    /// #Arguments
    /// * `dims` - dimensions of the matrix (num of rows, num of columns)
    /// * `a` - hyper parameter a0
    /// * `b` - hyper parameter b0
    ///
    fn new(dims: (usize, usize), a: Self::Scalar, b: Self::Scalar) -> Self {
        Self {
            num_rows: dims.0,
            num_columns: dims.1,
            a0: a,
            b0: b,
            a_stat: Self::Mat::from_elem(dims, a),
            b_stat: Self::Mat::from_elem(dims, b),
            a_prev: None,
            estimated_mean: Self::Mat::zeros(dims),
            estimated_log_mean: Self::Mat::zeros(dims),
        }
    }

    fn reset_stat(&mut self) {
        self.a_stat.fill(self.a0);
        self.b_stat.fill(self.b0);
    }

    fn add_shape(&mut self, ij: (usize, usize), x: Self::Scalar) {
        self.a_stat[ij] += x;
    }

    fn add_rate(&mut self, ij: (usize, usize), x: Self::Scalar) {
        self.b_stat[ij] += x;
    }

    fn add_rate_by_row(&mut self, v: &Array1<Self::Scalar>) {
        debug_assert_eq!(v.len(), self.num_rows);
        self.b_stat += &v.view().insert_axis(Axis(1));
    }

    fn add_rate_lane(&mut self, axis: Axis, index: usize, x: Self::Scalar) {
        self.b_stat
            .index_axis_mut(axis, index)
            .mapv_inplace(|b| b + x);
    }

    fn shape(&self) -> &Self::Mat {
        &self.a_stat
    }

    fn rate(&self) -> &Self::Mat {
        &self.b_stat
    }

    fn prior(&self) -> (Self::Scalar, Self::Scalar) {
        (self.a0, self.b0)
    }
}

impl StochasticParam for GammaMatrix {
    fn enable_stochastic(&mut self) {
        self.a_prev = Some(Array2::from_elem((self.num_rows, self.num_columns), self.a0));
    }

    fn blend_lane(&mut self, axis: Axis, index: usize, rho: f64) {
        let a_prev = self
            .a_prev
            .as_mut()
            .expect("blend_lane requires enable_stochastic");

        let mut prev = a_prev.index_axis_mut(axis, index);
        let mut curr = self.a_stat.index_axis_mut(axis, index);

        ndarray::Zip::from(&mut curr)
            .and(&mut prev)
            .for_each(|a, a_old| {
                *a = (1.0 - rho) * *a_old + rho * *a;
                *a_old = *a;
            });
    }
}

impl Inference for GammaMatrix {
    type Mat = Array2<f64>;
    type Scalar = f64;

    fn posterior_mean(&self) -> &Self::Mat {
        &self.estimated_mean
    }

    fn posterior_log_mean(&self) -> &Self::Mat {
        &self.estimated_log_mean
    }

    fn calibrate(&mut self) {
        for j in 0..self.num_columns {
            self.calibrate_lane(Axis(1), j);
        }
    }

    fn calibrate_lane(&mut self, axis: Axis, index: usize) {
        use special::Gamma;

        let a = self.a_stat.index_axis(axis, index);
        let b = self.b_stat.index_axis(axis, index);
        let mean = self.estimated_mean.index_axis_mut(axis, index);
        let log_mean = self.estimated_log_mean.index_axis_mut(axis, index);

        ndarray::Zip::from(mean)
            .and(log_mean)
            .and(&a)
            .and(&b)
            .for_each(|mu, log_mu, &a, &b| {
                assert!(
                    a > 0.0 && b > 0.0,
                    "non-positive gamma parameters: shape {}, rate {}",
                    a,
                    b
                );
                *mu = a / b;
                *log_mu = a.digamma() - b.ln();
            });
    }

    fn normalize_lane(&mut self, axis: Axis, index: usize) {
        let denom = self.estimated_mean.index_axis(axis, index).sum();
        assert!(denom > 0.0, "cannot normalize a lane with zero mass");
        let log_denom = denom.ln();

        self.estimated_mean
            .index_axis_mut(axis, index)
            .mapv_inplace(|x| x / denom);
        self.estimated_log_mean
            .index_axis_mut(axis, index)
            .mapv_inplace(|x| x - log_denom);
    }

    fn initialize_mean(&mut self, mean: Array2<f64>) {
        assert_eq!(mean.dim(), (self.num_rows, self.num_columns));
        self.estimated_log_mean = mean.mapv(f64::ln);
        self.estimated_mean = mean;
    }

    fn nrows(&self) -> usize {
        self.num_rows
    }

    fn ncols(&self) -> usize {
        self.num_columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use special::Gamma;

    #[test]
    fn reset_returns_to_prior() {
        let mut param = GammaMatrix::new((2, 3), 0.5, 2.0);
        param.add_shape((1, 2), 3.0);
        param.add_rate((0, 0), 1.0);
        param.reset_stat();

        assert!(param.shape().iter().all(|&a| a == 0.5));
        assert!(param.rate().iter().all(|&b| b == 2.0));
    }

    #[test]
    fn calibrate_column_only_touches_that_column() {
        let mut param = GammaMatrix::new((2, 3), 1.0, 1.0);
        param.add_shape((0, 1), 2.0);
        param.add_rate_lane(Axis(1), 1, 1.0);
        param.calibrate_lane(Axis(1), 1);

        let mean = param.posterior_mean();
        assert_abs_diff_eq!(mean[(0, 1)], 3.0 / 2.0);
        assert_abs_diff_eq!(mean[(1, 1)], 1.0 / 2.0);
        assert_eq!(mean[(0, 0)], 0.0);

        let log_mean = param.posterior_log_mean();
        assert_abs_diff_eq!(log_mean[(0, 1)], 3.0_f64.digamma() - 2.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn rate_by_row_broadcasts_over_columns() {
        let mut param = GammaMatrix::new((2, 3), 1.0, 1.0);
        param.add_rate_by_row(&ndarray::array![1.0, 2.0]);
        assert!(param.rate().row(0).iter().all(|&b| b == 2.0));
        assert!(param.rate().row(1).iter().all(|&b| b == 3.0));
    }

    #[test]
    fn normalized_row_sums_to_one() {
        let mut param = GammaMatrix::new((2, 4), 1.0, 1.0);
        for j in 0..4 {
            param.add_shape((0, j), j as f64);
        }
        param.calibrate_lane(Axis(0), 0);
        let log_before = param.posterior_log_mean().row(0).to_owned();
        let total = param.posterior_mean().row(0).sum();

        param.normalize_lane(Axis(0), 0);

        assert_abs_diff_eq!(param.posterior_mean().row(0).sum(), 1.0, epsilon = 1e-12);
        for j in 0..4 {
            assert_abs_diff_eq!(
                param.posterior_log_mean()[(0, j)],
                log_before[j] - total.ln(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn blend_is_a_moving_average() {
        let mut param = GammaMatrix::new((1, 2), 1.0, 1.0);
        param.enable_stochastic();
        param.add_shape((0, 0), 4.0);

        param.blend_lane(Axis(1), 0, 0.25);
        // 0.75 * 1 + 0.25 * 5
        assert_abs_diff_eq!(param.shape()[(0, 0)], 2.0);

        param.reset_stat();
        param.add_shape((0, 0), 1.0);
        param.blend_lane(Axis(1), 0, 0.5);
        // 0.5 * 2 + 0.5 * 2
        assert_abs_diff_eq!(param.shape()[(0, 0)], 2.0);
        assert_abs_diff_eq!(param.shape()[(0, 1)], 1.0);
    }

    #[test]
    #[should_panic]
    fn calibrate_rejects_non_positive_rate() {
        let mut param = GammaMatrix::new((1, 1), 1.0, 1.0);
        param.add_rate((0, 0), -1.0);
        param.calibrate();
    }
}
