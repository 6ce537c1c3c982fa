//! Categorical value encoding.
//!
//! Scalars (values and rewards) are squashed with
//! `h(x) = sign(x) * (sqrt(|x| + 1) - 1) + epsilon * x`, clamped to
//! `[-half_width, half_width]` and spread over the two neighbouring integer
//! bins of a `2 * half_width + 1` wide support. Decoding takes the expectation
//! over the bins and applies the closed-form inverse of `h`.
//!
//! Arithmetic runs in f64: the inverse subtracts two nearly equal numbers when
//! epsilon is small.

/// Default squashing epsilon.
pub const DEFAULT_EPSILON: f64 = 0.00001;

/// Encoder/decoder between scalars and categorical supports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupportCodec {
    half_width: usize,
    epsilon: f64,
}

impl SupportCodec {
    pub fn new(half_width: usize, epsilon: f64) -> Self {
        assert!(epsilon > 0.0, "support epsilon must be positive");
        Self {
            half_width,
            epsilon,
        }
    }

    /// Codec with the default epsilon.
    pub fn with_half_width(half_width: usize) -> Self {
        Self::new(half_width, DEFAULT_EPSILON)
    }

    #[inline]
    pub fn half_width(&self) -> usize {
        self.half_width
    }

    /// Number of bins in a support.
    #[inline]
    pub fn width(&self) -> usize {
        2 * self.half_width + 1
    }

    /// Encode one scalar into a support.
    ///
    /// # Panics
    /// If the resulting support does not sum to 1 within 1e-4.
    pub fn encode(&self, scalar: f32) -> Vec<f32> {
        let x = scalar as f64;
        let hw = self.half_width as f64;
        let h = (signum(x) * ((x.abs() + 1.0).sqrt() - 1.0) + self.epsilon * x).clamp(-hw, hw);

        let lower = h.floor();
        let ratio = h - lower;
        let lower_ndx = (lower + hw) as usize;

        let mut support = vec![0.0f32; self.width()];
        support[lower_ndx] = (1.0 - ratio) as f32;
        if ratio > 0.0 {
            support[lower_ndx + 1] = ratio as f32;
        }

        let total: f32 = support.iter().sum();
        assert!(
            (total - 1.0).abs() < 1e-4,
            "support for {} sums to {}, expected 1",
            scalar,
            total
        );
        support
    }

    /// Decode a support (a probability vector) back into a scalar.
    pub fn decode(&self, support: &[f32]) -> f32 {
        decode_with_epsilon(support, self.epsilon)
    }

    /// Encode a batch of independent scalars.
    pub fn encode_batch(&self, scalars: &[f32]) -> Vec<Vec<f32>> {
        scalars.iter().map(|&s| self.encode(s)).collect()
    }

    /// Decode a batch of independent supports.
    pub fn decode_batch<S: AsRef<[f32]>>(&self, supports: &[S]) -> Vec<f32> {
        supports.iter().map(|s| self.decode(s.as_ref())).collect()
    }
}

/// Decode a support of any odd width.
///
/// The half width is implied by the support length.
pub fn decode_with_epsilon(support: &[f32], epsilon: f64) -> f32 {
    debug_assert!(support.len() % 2 == 1, "support width must be odd");
    let half_width = (support.len() / 2) as f64;

    let expected: f64 = support
        .iter()
        .enumerate()
        .map(|(i, &p)| (i as f64 - half_width) * p as f64)
        .sum();

    let num = (1.0 + 4.0 * epsilon * (expected.abs() + 1.0 + epsilon)).sqrt() - 1.0;
    let res = (num / (2.0 * epsilon)).powi(2);
    (signum(expected) * (res - 1.0)) as f32
}

// Zero maps to +1 so that h(0) and its inverse stay at 0.
#[inline]
fn signum(x: f64) -> f64 {
    if x >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_sums_to_one() {
        let codec = SupportCodec::with_half_width(10);
        for x in [-300.0, -42.5, -1.0, 0.0, 0.3, 7.0, 99.9, 1e6] {
            let support = codec.encode(x);
            assert_eq!(support.len(), 21);
            let total: f32 = support.iter().sum();
            assert!((total - 1.0).abs() < 1e-4, "x={} total={}", x, total);
            assert!(support.iter().all(|&p| p >= 0.0));
        }
    }

    #[test]
    fn test_round_trip() {
        let codec = SupportCodec::with_half_width(10);
        let mut x = -100.0f32;
        while x <= 100.0 {
            let decoded = codec.decode(&codec.encode(x));
            assert!(
                (decoded - x).abs() < 1e-2 * (1.0 + x.abs()),
                "x={} decoded={}",
                x,
                decoded
            );
            x += 0.75;
        }
    }

    #[test]
    fn test_zero_is_centre_bin() {
        let codec = SupportCodec::with_half_width(5);
        let support = codec.encode(0.0);
        assert!((support[5] - 1.0).abs() < 1e-6);
        assert!(codec.decode(&support).abs() < 1e-6);
    }

    #[test]
    fn test_exact_at_integer_boundary() {
        // h(3) = sqrt(4) - 1 + eps * 3 = 1 + 3e-5, so the mass sits almost
        // entirely on bin +1.
        let codec = SupportCodec::new(4, 1e-5);
        let support = codec.encode(3.0);
        assert!(support[5] > 0.999);
        assert!((codec.decode(&support) - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_clamps_large_values() {
        let codec = SupportCodec::with_half_width(2);
        let support = codec.encode(1e9);
        assert!((support[4] - 1.0).abs() < 1e-6);
        let support = codec.encode(-1e9);
        assert!((support[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_batch_matches_scalar() {
        let codec = SupportCodec::with_half_width(10);
        let scalars = [-4.0, 0.0, 2.5];
        let supports = codec.encode_batch(&scalars);
        assert_eq!(supports.len(), 3);
        assert_eq!(supports[2], codec.encode(2.5));

        let decoded = codec.decode_batch(&supports);
        for (d, s) in decoded.iter().zip(scalars) {
            assert!((d - s).abs() < 1e-2);
        }
    }
}
