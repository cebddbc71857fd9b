//! Triangular time-decay kernel coupling a document's date to the
//! events of the preceding `window` dates.
//!
//! ```text
//! f(t, s) = 1 - (t - s) / window    if t - window < s <= t
//!         = 0                       otherwise
//! ```

use crate::common::*;
use matrix_util::utils::trailing_window;

/// Decay weight of an event on `event_date` seen from a document on
/// `doc_date`
#[inline]
pub fn decay_weight(doc_date: usize, event_date: usize, window: usize) -> f64 {
    debug_assert!(window > 0);
    if event_date > doc_date || event_date + window <= doc_date {
        return 0.0;
    }
    1.0 - (doc_date - event_date) as f64 / window as f64
}

/// Dense `dates x dates` table of decay weights and their logs,
/// indexed by (document date, event date)
pub struct DecayKernel {
    window: usize,
    weight: Mat,
    log_weight: Mat,
}

impl DecayKernel {
    pub fn new(num_dates: usize, window: usize) -> anyhow::Result<Self> {
        if window == 0 {
            anyhow::bail!("event window must be positive");
        }

        let weight = Mat::from_shape_fn((num_dates, num_dates), |(t, s)| {
            decay_weight(t, s, window)
        });
        // -inf outside the window; never read there
        let log_weight = weight.mapv(f64::ln);

        Ok(Self {
            window,
            weight,
            log_weight,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn num_dates(&self) -> usize {
        self.weight.nrows()
    }

    #[inline]
    pub fn weight(&self, doc_date: usize, event_date: usize) -> f64 {
        self.weight[(doc_date, event_date)]
    }

    #[inline]
    pub fn log_weight(&self, doc_date: usize, event_date: usize) -> f64 {
        debug_assert!(self.weight(doc_date, event_date) > 0.0);
        self.log_weight[(doc_date, event_date)]
    }

    /// Event dates with non-zero weight for a document on `doc_date`
    pub fn events_seen_from(&self, doc_date: usize) -> std::ops::RangeInclusive<usize> {
        trailing_window(doc_date, self.window)
    }

    /// Document dates on which an event of `event_date` still has
    /// non-zero weight
    pub fn dates_influenced_by(&self, event_date: usize) -> std::ops::Range<usize> {
        event_date..(event_date + self.window).min(self.num_dates())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn weight_boundaries() {
        for w in 1..6 {
            for d in 0..12 {
                assert_eq!(decay_weight(d, d, w), 1.0);
                assert_eq!(decay_weight(d, d + 1, w), 0.0);
                assert_eq!(decay_weight(d, d + 5, w), 0.0);
                if d >= w {
                    assert_eq!(decay_weight(d, d - w, w), 0.0);
                }
            }
        }
    }

    #[test]
    fn weight_decays_linearly() {
        assert_abs_diff_eq!(decay_weight(10, 9, 4), 0.75);
        assert_abs_diff_eq!(decay_weight(10, 8, 4), 0.5);
        assert_abs_diff_eq!(decay_weight(10, 7, 4), 0.25);
        assert_eq!(decay_weight(10, 6, 4), 0.0);
    }

    #[test]
    fn kernel_matches_weight_function() {
        let kernel = DecayKernel::new(6, 3).unwrap();
        for t in 0..6 {
            for s in 0..6 {
                let w = decay_weight(t, s, 3);
                assert_eq!(kernel.weight(t, s), w);
                assert!(w >= 0.0 && w <= 1.0);
                if w > 0.0 {
                    assert_abs_diff_eq!(kernel.log_weight(t, s), w.ln());
                }
            }
        }
    }

    #[test]
    fn windows_in_both_directions() {
        let kernel = DecayKernel::new(6, 3).unwrap();
        assert_eq!(kernel.events_seen_from(1), 0..=1);
        assert_eq!(kernel.events_seen_from(4), 2..=4);
        assert_eq!(kernel.dates_influenced_by(2), 2..5);
        assert_eq!(kernel.dates_influenced_by(4), 4..6);

        for s in 0..6 {
            for t in kernel.dates_influenced_by(s) {
                assert!(kernel.weight(t, s) > 0.0);
                assert!(kernel.events_seen_from(t).contains(&s));
            }
        }
    }

    #[test]
    fn zero_window_is_a_configuration_error() {
        assert!(DecayKernel::new(4, 0).is_err());
    }
}
