use serde::Serialize;
use statrs::function::erf::erfc;
use statrs::statistics::{Data, Median, Statistics};
use std::cmp::Ordering;

/// Mean magnitudes at or below this are treated as absent when normalizing.
pub const MIN_NORMALIZING_MEAN: f64 = f64::EPSILON;

/// Orders scores from highest to lowest. NaN and infinite scores sort after
/// every finite number so a degenerate score never lands at the top of a list.
pub fn cmp_descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_finite(), b.is_finite()) {
        (false, false) => Ordering::Equal,
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        (true, true) => b.total_cmp(&a),
    }
}

/// Orders scores from lowest to highest, non-finite last.
pub fn cmp_ascending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_finite(), b.is_finite()) {
        (false, false) => Ordering::Equal,
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        (true, true) => a.total_cmp(&b),
    }
}

/// Mean of `values`, NaN when empty.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().mean()
}

/// Median of `values`, NaN when empty.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    Data::new(values.to_vec()).median()
}

/// Class standard deviation. `biased` divides by n instead of n - 1. Too few
/// values for the chosen divisor give 0.
pub fn std_dev(values: &[f64], biased: bool) -> f64 {
    let sd = if biased {
        values.iter().population_std_dev()
    } else {
        values.iter().std_dev()
    };
    if sd.is_nan() && values.iter().all(|v| v.is_finite()) {
        0.0
    } else {
        sd
    }
}

/// Pearson correlation. Returns NaN when either side has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.is_empty() || y.is_empty() {
        return f64::NAN;
    }
    let (mx, my) = (mean(x), mean(y));
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y.iter()) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx) * (a - mx);
        syy += (b - my) * (b - my);
    }
    sxy / (sxx * syy).sqrt()
}

/// Means of the two halves of a null distribution. `positive` is the mean of
/// the values >= 0, `negative` the absolute mean of the values < 0. A half
/// that is empty, or whose mean is indistinguishable from zero, is `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignedMeans {
    pub positive: Option<f64>,
    pub negative: Option<f64>,
}

impl SignedMeans {
    pub fn of(values: &[f64]) -> SignedMeans {
        let mut pos_sum = 0.0;
        let mut pos_n = 0usize;
        let mut neg_sum = 0.0;
        let mut neg_n = 0usize;
        for &v in values.iter().filter(|v| v.is_finite()) {
            if v >= 0.0 {
                pos_sum += v;
                pos_n += 1;
            } else {
                neg_sum += v;
                neg_n += 1;
            }
        }
        let usable = |sum: f64, n: usize| {
            if n == 0 {
                return None;
            }
            let m = (sum / n as f64).abs();
            if m <= MIN_NORMALIZING_MEAN {
                None
            } else {
                Some(m)
            }
        };
        SignedMeans {
            positive: usable(pos_sum, pos_n),
            negative: usable(neg_sum, neg_n),
        }
    }

    /// Divides `value` by the mean of its own sign, keeping the sign.
    /// Zero stays zero. `None` when the matching half has no usable mean.
    pub fn normalize(&self, value: f64) -> Option<f64> {
        if value == 0.0 {
            return Some(0.0);
        }
        if value > 0.0 {
            self.positive.map(|m| value / m)
        } else {
            self.negative.map(|m| value / m)
        }
    }
}

/// Mann-Whitney U statistic for the hit ranks of a gene set against the rest
/// of the ranked list, with a normal approximation two-sided p-value. Ranks
/// in a ranked list are unique so no tie correction is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MannWhitney {
    pub u: f64,
    pub z: f64,
    pub p_value: f64,
}

impl MannWhitney {
    /// `rank_sum` is the sum of the 1-based ranks of the `n_hits` hits in a
    /// list of `n_total` features.
    pub fn from_rank_sum(rank_sum: f64, n_hits: usize, n_total: usize) -> Option<MannWhitney> {
        if n_hits == 0 || n_hits >= n_total {
            return None;
        }
        let n1 = n_hits as f64;
        let n2 = (n_total - n_hits) as f64;
        let u = rank_sum - n1 * (n1 + 1.0) / 2.0;
        let mu = n1 * n2 / 2.0;
        let sigma = (n1 * n2 * (n_total as f64 + 1.0) / 12.0).sqrt();
        let z = (u - mu) / sigma;
        let p_value = erfc(z.abs() / std::f64::consts::SQRT_2).min(1.0);
        Some(MannWhitney { u, z, p_value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statrs::assert_almost_eq;

    #[test]
    fn nan_sorts_last_both_ways() {
        let mut v = vec![1.0, f64::NAN, 3.0, -2.0];
        v.sort_by(|a, b| cmp_descending_nan_last(*a, *b));
        assert_eq!(&v[..3], &[3.0, 1.0, -2.0]);
        assert!(v[3].is_nan());
        v.sort_by(|a, b| cmp_ascending_nan_last(*a, *b));
        assert_eq!(&v[..3], &[-2.0, 1.0, 3.0]);
        assert!(v[3].is_nan());
    }

    #[test]
    fn infinities_sort_last_both_ways() {
        let mut v = vec![1.0, f64::INFINITY, 3.0, f64::NEG_INFINITY, -2.0];
        v.sort_by(|a, b| cmp_descending_nan_last(*a, *b));
        assert_eq!(&v[..3], &[3.0, 1.0, -2.0]);
        assert!(v[3..].iter().all(|x| x.is_infinite()));
        v.sort_by(|a, b| cmp_ascending_nan_last(*a, *b));
        assert_eq!(&v[..3], &[-2.0, 1.0, 3.0]);
        assert!(v[3..].iter().all(|x| x.is_infinite()));
    }

    #[test]
    fn signed_means_split_on_zero() {
        let means = SignedMeans::of(&[0.2, 0.4, -0.5, -1.5, f64::NAN]);
        assert_almost_eq!(means.positive.unwrap(), 0.3, 1e-12);
        assert_almost_eq!(means.negative.unwrap(), 1.0, 1e-12);
        assert_almost_eq!(means.normalize(0.6).unwrap(), 2.0, 1e-12);
        assert_almost_eq!(means.normalize(-2.0).unwrap(), -2.0, 1e-12);
    }

    #[test]
    fn signed_means_missing_half_is_none() {
        let means = SignedMeans::of(&[0.1, 0.3]);
        assert!(means.negative.is_none());
        assert_eq!(means.normalize(-0.4), None);
        let zeros = SignedMeans::of(&[0.0, 0.0]);
        assert!(zeros.positive.is_none());
        assert_eq!(zeros.normalize(0.0), Some(0.0));
    }

    #[test]
    fn median_and_std_dev() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert!(median(&[]).is_nan());
        assert_almost_eq!(mean(&[1.0, 2.0, 6.0]), 3.0, 1e-12);
        assert_almost_eq!(std_dev(&[1.0, 2.0, 3.0], false), 1.0, 1e-12);
        assert_almost_eq!(std_dev(&[1.0, 3.0], true), 1.0, 1e-12);
        assert_eq!(std_dev(&[4.0], false), 0.0);
    }

    #[test]
    fn mann_whitney_top_hits() {
        // hits at 1-based ranks 1, 2, 3 of 10
        let mw = MannWhitney::from_rank_sum(6.0, 3, 10).unwrap();
        assert_almost_eq!(mw.u, 0.0, 1e-12);
        assert!(mw.z < 0.0);
        assert!(mw.p_value < 0.05);
        assert!(MannWhitney::from_rank_sum(0.0, 0, 10).is_none());
    }

    #[test]
    fn pearson_perfect_correlation() {
        assert_almost_eq!(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]), 1.0, 1e-12);
        assert!(pearson(&[1.0, 1.0], &[1.0, 2.0]).is_nan());
    }
}
