pub mod density;
pub mod io;
pub mod ndarray_gamma;
pub mod traits;
