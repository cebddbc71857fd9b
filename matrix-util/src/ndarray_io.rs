use crate::common_io::{read_lines_of_words, write_lines};
use crate::traits::IoOps;
use ndarray::prelude::*;
use std::fmt::{Display, LowerExp};
use std::str::FromStr;

impl<T> IoOps for Array2<T>
where
    T: FromStr + LowerExp + Copy + Default,
    <T as FromStr>::Err: Display,
{
    type Scalar = T;
    type Mat = Self;

    fn from_id_tsv(tsv_file: &str) -> anyhow::Result<Self::Mat> {
        let lines_of_words = read_lines_of_words(tsv_file, -1)?.lines;

        if lines_of_words.is_empty() {
            return Err(anyhow::anyhow!("No data in file {}", tsv_file));
        }

        let ncols = lines_of_words[0].len().saturating_sub(1);
        let mut rows: Vec<(usize, Vec<T>)> = Vec::with_capacity(lines_of_words.len());

        for words in lines_of_words.iter() {
            if words.len() != ncols + 1 {
                return Err(anyhow::anyhow!(
                    "{}: expected {} values after the id, found {}",
                    tsv_file,
                    ncols,
                    words.len().saturating_sub(1)
                ));
            }
            let id = words[0]
                .parse::<usize>()
                .map_err(|e| anyhow::anyhow!("{}: bad row id `{}`: {}", tsv_file, words[0], e))?;
            let values = words[1..]
                .iter()
                .map(|v| {
                    v.parse::<T>()
                        .map_err(|e| anyhow::anyhow!("{}: bad value `{}`: {}", tsv_file, v, e))
                })
                .collect::<anyhow::Result<Vec<T>>>()?;
            rows.push((id, values));
        }

        let nrows = rows.iter().map(|(i, _)| *i).max().map_or(0, |m| m + 1);
        if nrows != rows.len() {
            return Err(anyhow::anyhow!(
                "{}: row ids are not a dense range 0..{}",
                tsv_file,
                rows.len()
            ));
        }

        let mut seen = vec![false; nrows];
        for &(i, _) in rows.iter() {
            if seen[i] {
                return Err(anyhow::anyhow!("{}: duplicate row id {}", tsv_file, i));
            }
            seen[i] = true;
        }

        let mut ret = Array2::<T>::default((nrows, ncols));
        for (i, values) in rows {
            for (j, x) in values.into_iter().enumerate() {
                ret[(i, j)] = x;
            }
        }
        Ok(ret)
    }

    fn to_id_tsv(&self, tsv_file: &str) -> anyhow::Result<()> {
        let lines: Vec<Box<str>> = self
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let mut line = i.to_string();
                for x in row.iter() {
                    line.push_str(&format!("\t{:.6e}", *x));
                }
                line.into_boxed_str()
            })
            .collect();
        write_lines(&lines, tsv_file)?;
        Ok(())
    }
}
