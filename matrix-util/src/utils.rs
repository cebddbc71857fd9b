use rand::Rng;

/// Draw `size` indexes uniformly from `0..ntot` with replacement
/// * `ntot` - number of total samples
/// * `size` - number of draws
pub fn sample_with_replacement<R: Rng + ?Sized>(ntot: usize, size: usize, rng: &mut R) -> Vec<usize> {
    if ntot == 0 {
        return vec![];
    }
    (0..size).map(|_| rng.random_range(0..ntot)).collect()
}

/// Window `[lb, ub]` of `width` steps ending at `t`, clipped at zero
/// * `t` - last index of the window (inclusive)
/// * `width` - number of steps looking back (including `t`)
pub fn trailing_window(t: usize, width: usize) -> std::ops::RangeInclusive<usize> {
    let lb = (t + 1).saturating_sub(width);
    lb..=t
}
