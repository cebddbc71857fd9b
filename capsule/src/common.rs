#![allow(unused_imports)]

pub use log::{debug, info, warn};

pub use matrix_param::ndarray_gamma::GammaMatrix;
pub use matrix_param::traits::{Inference, StochasticParam, TwoStatParam};
pub use ndarray::{Array1, Array2, Axis};

pub type Mat = ndarray::Array2<f64>;
