use ndarray::{Array1, Array2, Axis};

/// Posterior summaries of a variational parameter matrix
pub trait Inference {
    type Mat;
    type Scalar;

    fn posterior_mean(&self) -> &Self::Mat;
    fn posterior_log_mean(&self) -> &Self::Mat;

    /// Recompute mean and log-mean of every cell
    fn calibrate(&mut self);

    /// Recompute mean and log-mean of one row (`Axis(0)`) or one
    /// column (`Axis(1)`)
    fn calibrate_lane(&mut self, axis: Axis, index: usize);

    /// Rescale the mean of one lane to sum to one, shifting the
    /// log-mean by the same amount
    fn normalize_lane(&mut self, axis: Axis, index: usize);

    /// Overwrite the mean directly (e.g., random initialization);
    /// the log-mean becomes `ln(mean)`
    fn initialize_mean(&mut self, mean: Array2<Self::Scalar>);

    fn nrows(&self) -> usize;
    fn ncols(&self) -> usize;
}

/// A parameter matrix with two types of statistics (shape `a` and
/// rate `b`) with hyper parameters a0 and b0
pub trait TwoStatParam {
    type Mat;
    type Scalar;

    fn new(dims: (usize, usize), a0: Self::Scalar, b0: Self::Scalar) -> Self;

    /// Back to the prior: `a = a0`, `b = b0` everywhere
    fn reset_stat(&mut self);

    /// `a[i,j] += x`
    fn add_shape(&mut self, ij: (usize, usize), x: Self::Scalar);

    /// `b[i,j] += x`
    fn add_rate(&mut self, ij: (usize, usize), x: Self::Scalar);

    /// `b[i,:] += v[i]` for every row `i`
    fn add_rate_by_row(&mut self, v: &Array1<Self::Scalar>);

    /// `b[lane] += x` for one row (`Axis(0)`) or column (`Axis(1)`)
    fn add_rate_lane(&mut self, axis: Axis, index: usize, x: Self::Scalar);

    fn shape(&self) -> &Self::Mat;
    fn rate(&self) -> &Self::Mat;
    fn prior(&self) -> (Self::Scalar, Self::Scalar);
}

/// Exponential moving average of the shape statistic across
/// mini-batches
pub trait StochasticParam: TwoStatParam {
    /// Keep a shadow copy of the previous shape, starting from the prior
    fn enable_stochastic(&mut self);

    /// `a[lane] = (1 - rho) * a_prev[lane] + rho * a[lane]`, then
    /// `a_prev[lane] = a[lane]`
    fn blend_lane(&mut self, axis: Axis, index: usize, rho: Self::Scalar);
}
