/// Normalize rows of a non-negative matrix
pub trait MatOps {
    type Mat;
    type Scalar;

    /// Rescale every row to sum to one (rows summing to zero are left alone)
    fn sum_to_one_rows_inplace(&mut self);
    fn sum_to_one_rows(&self) -> Self::Mat;
}

/// Operations to sample random matrices with an explicit generator
pub trait SampleOps {
    type Mat;
    type Scalar;

    /// Sample a matrix from the open interval `U(0,1)`
    fn runif_open<R: rand::Rng + ?Sized>(dd: usize, nn: usize, rng: &mut R) -> Self::Mat;
}

/// Read and write matrices as id-keyed tables:
///
/// ```text
/// id <tab> x[id,0] <tab> x[id,1] ...
/// ```
///
/// one line per row, values in scientific notation
pub trait IoOps {
    type Scalar;
    type Mat;

    /// Read a table back into a matrix, placing each line at the
    /// row given by its id
    fn from_id_tsv(tsv_file: &str) -> anyhow::Result<Self::Mat>;

    /// Write one line per row, prefixed by the row index
    fn to_id_tsv(&self, tsv_file: &str) -> anyhow::Result<()>;
}
