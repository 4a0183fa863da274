//! Normalized Innovation Squared (NIS) consistency checks
//!
//! For a well-tuned filter the NIS of an M-dimensional measurement follows a
//! chi-square distribution with M degrees of freedom, so about 95% of the
//! values should fall below the 95th percentile of that distribution.

use nalgebra::RealField;

/// 95th percentile of the chi-square distribution, indexed by degrees of freedom - 1.
const CHI_SQUARED_95: [f64; 5] = [3.841, 5.991, 7.815, 9.488, 11.070];

/// Returns the 95% chi-square bound for `dof` degrees of freedom (1 to 5).
pub fn chi_squared_95(dof: usize) -> Option<f64> {
    dof.checked_sub(1)
        .and_then(|i| CHI_SQUARED_95.get(i))
        .copied()
}

/// Counts how many NIS values stay within the 95% chi-square bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NisMonitor<T: RealField> {
    bound: T,
    total: usize,
    within: usize,
    sum: T,
}

impl<T: RealField + Copy> NisMonitor<T> {
    /// Creates a monitor for measurements with `dof` components.
    ///
    /// Returns `None` if no bound is tabulated for `dof`.
    pub fn for_dimension(dof: usize) -> Option<Self> {
        chi_squared_95(dof).map(|b| Self::with_bound(nalgebra::convert(b)))
    }

    /// Creates a monitor with an explicit bound.
    pub fn with_bound(bound: T) -> Self {
        Self {
            bound,
            total: 0,
            within: 0,
            sum: T::zero(),
        }
    }

    /// Records one NIS value and returns whether it lies within the bound.
    pub fn record(&mut self, nis: T) -> bool {
        self.total += 1;
        self.sum += nis;
        let inside = nis <= self.bound;
        if inside {
            self.within += 1;
        }
        inside
    }

    #[inline]
    pub fn bound(&self) -> T {
        self.bound
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    #[inline]
    pub fn within(&self) -> usize {
        self.within
    }

    /// Fraction of recorded values within the bound, `None` before the first record.
    pub fn fraction_within(&self) -> Option<T> {
        if self.total == 0 {
            return None;
        }
        let within: T = nalgebra::convert(self.within as f64);
        let total: T = nalgebra::convert(self.total as f64);
        Some(within / total)
    }

    /// Mean NIS; should approach the measurement dimension for a consistent filter.
    pub fn mean(&self) -> Option<T> {
        if self.total == 0 {
            return None;
        }
        let total: T = nalgebra::convert(self.total as f64);
        Some(self.sum / total)
    }
}
