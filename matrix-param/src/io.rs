use crate::traits::*;
use matrix_util::traits::IoOps;
use ndarray::Array2;

/// Which way a parameter matrix is laid out in a factor file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileLayout {
    /// one line per row of the matrix
    AsIs,
    /// one line per column of the matrix
    Transposed,
}

/// Write and read back the posterior mean as an id-keyed table
pub trait ParamIo: Inference<Mat = Array2<f64>> {
    fn mean_to_tsv(&self, file_path: &str, layout: FileLayout) -> anyhow::Result<()> {
        match layout {
            FileLayout::AsIs => self.posterior_mean().to_id_tsv(file_path),
            FileLayout::Transposed => self.posterior_mean().t().to_owned().to_id_tsv(file_path),
        }
    }
}

impl<T: Inference<Mat = Array2<f64>>> ParamIo for T {}

/// Read a matrix written by [`ParamIo::mean_to_tsv`] with the same
/// `layout`, checking its dimensions
pub fn mean_from_tsv(
    file_path: &str,
    layout: FileLayout,
    dims: (usize, usize),
) -> anyhow::Result<Array2<f64>> {
    let mat = Array2::<f64>::from_id_tsv(file_path)?;
    let mat = match layout {
        FileLayout::AsIs => mat,
        FileLayout::Transposed => mat.reversed_axes(),
    };
    if mat.dim() != dims {
        return Err(anyhow::anyhow!(
            "{}: expected a {} x {} matrix, found {} x {}",
            file_path,
            dims.0,
            dims.1,
            mat.nrows(),
            mat.ncols()
        ));
    }
    Ok(mat)
}
