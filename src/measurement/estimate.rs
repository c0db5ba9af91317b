//! Running and binned estimators.

use std::ops::{AddAssign, Div, Mul};

use num_traits::Zero;

/// Values an estimator can accumulate: real or complex samples.
pub trait EstimateValue:
    Copy + Zero + AddAssign + Mul<Output = Self> + Div<f64, Output = Self>
{
}

impl<T> EstimateValue for T where
    T: Copy + Zero + AddAssign + Mul<Output = T> + Div<f64, Output = T>
{
}

#[derive(Debug, Clone, Copy)]
struct Accumulator<T> {
    sum: T,
    count: usize,
}

impl<T: EstimateValue> Accumulator<T> {
    fn new() -> Self {
        Accumulator {
            sum: T::zero(),
            count: 0,
        }
    }

    fn add(&mut self, value: T) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> T {
        assert!(self.count > 0, "no values accumulated");
        self.sum / self.count as f64
    }
}

/// Mean/sum/count bookkeeping with a resettable "recent" window alongside
/// the cumulative history.
#[derive(Debug, Clone)]
pub struct RunningEstimate<T> {
    recent: Accumulator<T>,
    cumulative: Accumulator<T>,
}

impl<T: EstimateValue> RunningEstimate<T> {
    pub fn new() -> Self {
        RunningEstimate {
            recent: Accumulator::new(),
            cumulative: Accumulator::new(),
        }
    }

    pub fn add_value(&mut self, value: T) {
        self.recent.add(value);
        self.cumulative.add(value);
    }

    /// Average of the values since the most recent reset.
    pub fn recent_result(&self) -> T {
        self.recent.mean()
    }

    /// Average of every value ever added.
    pub fn cumulative_result(&self) -> T {
        self.cumulative.mean()
    }

    pub fn num_recent_values(&self) -> usize {
        self.recent.count
    }

    pub fn num_cumulative_values(&self) -> usize {
        self.cumulative.count
    }

    pub fn cumulative_total_value(&self) -> T {
        self.cumulative.sum
    }

    /// Clears the recent window only.
    pub fn reset(&mut self) {
        self.recent = Accumulator::new();
    }
}

impl<T: EstimateValue> Default for RunningEstimate<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
struct BinnedSum<T> {
    current_sum: T,
    cumulative_sum: T,
    cumulative_sum_squared: T,
}

/// Running estimate with power-of-two binning, for error bars that account
/// for autocorrelation.
///
/// Bin level i groups 2^i consecutive values.  A new level is created on
/// the value that brings the count to a power of two; each incoming value
/// accumulates into every level's current sum, and levels fold their
/// current sum into (sum, sum of squares) as the count's binary carries
/// dictate.
#[derive(Debug, Clone)]
pub struct BinnedEstimate<T> {
    running: RunningEstimate<T>,
    binlevel_data: Vec<BinnedSum<T>>,
}

fn is_just_below_a_power_of_two(x: usize) -> bool {
    x & (x + 1) == 0
}

impl<T: EstimateValue> BinnedEstimate<T> {
    pub fn new() -> Self {
        BinnedEstimate {
            running: RunningEstimate::new(),
            binlevel_data: Vec::new(),
        }
    }

    pub fn add_value(&mut self, value: T) {
        // create a new bin level when the count is about to reach a power
        // of two
        if is_just_below_a_power_of_two(self.running.num_cumulative_values()) {
            self.binlevel_data.push(BinnedSum {
                current_sum: self.running.cumulative_total_value(),
                cumulative_sum: T::zero(),
                cumulative_sum_squared: T::zero(),
            });
        }

        self.running.add_value(value);
        let count = self.running.num_cumulative_values();
        debug_assert!((1usize << self.binlevel_data.len()) > count);
        debug_assert!((1usize << (self.binlevel_data.len() - 1)) <= count);

        for bin in &mut self.binlevel_data {
            bin.current_sum += value;
        }

        // fold each level up to the lowest set bit of the new count
        for (i, bin) in self.binlevel_data.iter_mut().enumerate() {
            bin.cumulative_sum += bin.current_sum;
            bin.cumulative_sum_squared += bin.current_sum * bin.current_sum;
            bin.current_sum = T::zero();
            if count & (1 << i) != 0 {
                break;
            }
        }
    }

    pub fn recent_result(&self) -> T {
        self.running.recent_result()
    }

    pub fn cumulative_result(&self) -> T {
        self.running.cumulative_result()
    }

    pub fn num_cumulative_values(&self) -> usize {
        self.running.num_cumulative_values()
    }

    pub fn reset(&mut self) {
        self.running.reset();
    }

    pub fn num_bin_levels(&self) -> usize {
        self.binlevel_data.len()
    }

    /// (mean of bin sums, mean of squared bin sums, number of folds) at one
    /// bin level; inputs for a blocking error analysis.
    pub fn bin_level_sums(&self, level: usize) -> (T, T, usize) {
        let bin = &self.binlevel_data[level];
        let folds = self.running.num_cumulative_values() >> level;
        (bin.cumulative_sum, bin.cumulative_sum_squared, folds)
    }
}

impl<T: EstimateValue> Default for BinnedEstimate<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_complex::Complex64;

    #[test]
    fn test_running_means() {
        let mut e = RunningEstimate::<f64>::new();
        for x in [1.0, 2.0, 3.0, 4.0] {
            e.add_value(x);
        }
        assert_relative_eq!(e.cumulative_result(), 2.5);
        assert_relative_eq!(e.recent_result(), 2.5);
        assert_eq!(e.num_cumulative_values(), 4);

        e.reset();
        e.add_value(10.0);
        assert_relative_eq!(e.recent_result(), 10.0);
        assert_relative_eq!(e.cumulative_result(), 4.0);
        assert_eq!(e.num_recent_values(), 1);
        assert_eq!(e.num_cumulative_values(), 5);
    }

    #[test]
    fn test_running_complex() {
        let mut e = RunningEstimate::<Complex64>::new();
        e.add_value(Complex64::new(1.0, 1.0));
        e.add_value(Complex64::new(3.0, -1.0));
        let mean = e.cumulative_result();
        assert_relative_eq!(mean.re, 2.0);
        assert_relative_eq!(mean.im, 0.0);
    }

    #[test]
    fn test_bin_levels_grow_with_count() {
        let mut e = BinnedEstimate::<f64>::new();
        assert_eq!(e.num_bin_levels(), 0);
        e.add_value(1.0);
        assert_eq!(e.num_bin_levels(), 1);
        e.add_value(1.0);
        assert_eq!(e.num_bin_levels(), 2);
        e.add_value(1.0);
        assert_eq!(e.num_bin_levels(), 2);
        e.add_value(1.0);
        assert_eq!(e.num_bin_levels(), 3);
        for _ in 0..4 {
            e.add_value(1.0);
        }
        assert_eq!(e.num_bin_levels(), 4);
    }

    #[test]
    fn test_binned_sums_match_blocking() {
        // for 8 constant values, level i has seen 8 >> i folds each of
        // value 2^i
        let mut e = BinnedEstimate::<f64>::new();
        for _ in 0..8 {
            e.add_value(1.0);
        }
        for level in 0..3 {
            let (sum, sum_sq, folds) = e.bin_level_sums(level);
            let block = (1usize << level) as f64;
            assert_eq!(folds, 8 >> level);
            assert_relative_eq!(sum, folds as f64 * block);
            assert_relative_eq!(sum_sq, folds as f64 * block * block);
        }
        assert_relative_eq!(e.cumulative_result(), 1.0);
    }

    #[test]
    fn test_binned_alternating_values() {
        // alternating +1/-1: level 0 sums are +-1, level 1 blocks sum to 0
        let mut e = BinnedEstimate::<f64>::new();
        for i in 0..8 {
            e.add_value(if i % 2 == 0 { 1.0 } else { -1.0 });
        }
        let (sum0, sum_sq0, folds0) = e.bin_level_sums(0);
        assert_relative_eq!(sum0, 0.0);
        assert_relative_eq!(sum_sq0, folds0 as f64);
        let (sum1, sum_sq1, _) = e.bin_level_sums(1);
        assert_relative_eq!(sum1, 0.0);
        assert_relative_eq!(sum_sq1, 0.0);
    }
}
