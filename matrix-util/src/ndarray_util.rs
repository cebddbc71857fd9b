pub use ndarray::prelude::*;

use crate::traits::*;
use num_traits::{Float, FromPrimitive};
use rand::distr::Open01;
use rand::Rng;

impl<T> SampleOps for ndarray::Array2<T>
where
    T: Float + FromPrimitive,
{
    type Mat = Self;
    type Scalar = T;

    fn runif_open<R: Rng + ?Sized>(dd: usize, nn: usize, rng: &mut R) -> Self::Mat {
        Array2::from_shape_simple_fn((dd, nn), || {
            let x: f64 = rng.sample(Open01);
            T::from_f64(x).expect("failed to type")
        })
    }
}

impl<T> MatOps for ndarray::Array2<T>
where
    T: Float + FromPrimitive,
{
    type Mat = Self;
    type Scalar = T;

    fn sum_to_one_rows_inplace(&mut self) {
        for mut x_i in self.rows_mut() {
            let denom = x_i.fold(T::zero(), |acc, &x| acc + x);
            if denom > T::zero() {
                x_i.mapv_inplace(|x| x / denom);
            }
        }
    }

    fn sum_to_one_rows(&self) -> Self::Mat {
        let mut xx = self.clone();
        xx.sum_to_one_rows_inplace();
        xx
    }
}
