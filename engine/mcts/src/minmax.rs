//! Running min/max tracker used to rescale backed-up values into [0, 1] so
//! that they are comparable with policy priors in the action score.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxStats {
    pub max_value: f32,
    pub min_value: f32,
}

impl Default for MinMaxStats {
    fn default() -> Self {
        Self::new()
    }
}

impl MinMaxStats {
    /// Empty tracker: any observed value replaces both bounds.
    pub fn new() -> Self {
        Self {
            max_value: f32::NEG_INFINITY,
            min_value: f32::INFINITY,
        }
    }

    #[inline]
    pub fn update(&mut self, value: f32) {
        self.max_value = self.max_value.max(value);
        self.min_value = self.min_value.min(value);
    }

    /// Rescale `value` linearly onto [min, max]. Returns `value` unchanged
    /// until some spread has been observed.
    #[inline]
    pub fn normalize(&self, value: f32) -> f32 {
        if self.max_value > self.min_value {
            (value - self.min_value) / (self.max_value - self.min_value)
        } else {
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_before_update_is_identity() {
        let stats = MinMaxStats::new();
        assert_eq!(stats.normalize(3.5), 3.5);
        assert_eq!(stats.normalize(-1.0), -1.0);
    }

    #[test]
    fn test_single_value_is_degenerate() {
        let mut stats = MinMaxStats::new();
        stats.update(2.0);
        assert_eq!(stats.normalize(2.0), 2.0);
    }

    #[test]
    fn test_normalize_observed_range_in_unit_interval() {
        let mut stats = MinMaxStats::new();
        let values = [3.0, -2.0, 7.5, 0.0, 1.25];
        for v in values {
            stats.update(v);
        }
        assert_eq!(stats.min_value, -2.0);
        assert_eq!(stats.max_value, 7.5);
        for v in values {
            let n = stats.normalize(v);
            assert!((0.0..=1.0).contains(&n), "{} -> {}", v, n);
        }
        assert!((stats.normalize(-2.0)).abs() < 1e-6);
        assert!((stats.normalize(7.5) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_range_never_shrinks() {
        let mut stats = MinMaxStats::new();
        stats.update(10.0);
        stats.update(-10.0);
        stats.update(0.0);
        assert_eq!(stats.max_value, 10.0);
        assert_eq!(stats.min_value, -10.0);
    }
}
