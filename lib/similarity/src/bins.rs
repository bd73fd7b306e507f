//! Token construction
//!
//! Maps attribute values onto the shared token space:
//! `"{attr}:{value}"` for text, `"{attr}:bin:{index}"` for numbers,
//! `"tag:{t}"` for tags and `"price_tier:{tier}"` for the price tier.

/// Bin index of a numeric value: `floor(value / width)`
#[inline]
pub fn bin_index(value: f64, width: f64) -> i64 {
    (value / width).floor() as i64
}

#[inline]
pub fn bin_token(attribute: &str, index: i64) -> String {
    format!("{attribute}:bin:{index}")
}

#[inline]
pub fn tag_token(tag: &str) -> String {
    format!("tag:{tag}")
}

#[inline]
pub fn price_tier_token(tier: &str) -> String {
    format!("price_tier:{tier}")
}

/// Token of a text value; values that read as numbers are binned so that
/// `"2019"` and `2019` land on the same token
pub fn value_token(attribute: &str, value: &str, width: f64) -> String {
    match value.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => bin_token(attribute, bin_index(n, width)),
        _ => format!("{attribute}:{value}"),
    }
}

/// Bins covered by a numeric range.
///
/// An open range extends `max_bins` from its closed end, clamped to the
/// `i64` bin space. A range covering more than `max_bins` bins is sampled
/// evenly, both ends included.
pub fn range_bins(min: Option<f64>, max: Option<f64>, width: f64, max_bins: usize) -> Vec<i64> {
    let max_bins = max_bins.max(1) as i128;
    let (lo, hi) = match (min, max) {
        (Some(lo), Some(hi)) => (i128::from(bin_index(lo, width)), i128::from(bin_index(hi, width))),
        (Some(lo), None) => {
            let lo = i128::from(bin_index(lo, width));
            (lo, lo + max_bins - 1)
        }
        (None, Some(hi)) => {
            let hi = i128::from(bin_index(hi, width));
            (hi - max_bins + 1, hi)
        }
        (None, None) => return Vec::new(),
    };
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    let lo = lo.max(i128::from(i64::MIN));
    let hi = hi.min(i128::from(i64::MAX));

    let count = hi - lo + 1;
    let bins: Vec<i128> = if count <= max_bins {
        (lo..=hi).collect()
    } else if max_bins == 1 {
        vec![lo + (count - 1) / 2]
    } else {
        // rounded `i * (count - 1) / (max_bins - 1)`
        let steps = max_bins - 1;
        let mut sampled: Vec<i128> =
            (0..max_bins).map(|i| lo + (2 * i * (count - 1) + steps) / (2 * steps)).collect();
        sampled.dedup();
        sampled
    };
    bins.into_iter().filter_map(|bin| i64::try_from(bin).ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_index() {
        assert_eq!(bin_index(21_000.0, 5_000.0), 4);
        assert_eq!(bin_index(2019.0, 1.0), 2019);
        assert_eq!(bin_index(-1.0, 5.0), -1);
    }

    #[test]
    fn test_value_token() {
        assert_eq!(value_token("make", "honda", 1.0), "make:honda");
        assert_eq!(value_token("year", "2019", 1.0), "year:bin:2019");
        assert_eq!(value_token("price", "21000", 5000.0), "price:bin:4");
    }

    #[test]
    fn test_closed_range() {
        assert_eq!(range_bins(Some(0.0), Some(30_000.0), 5_000.0, 24), vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(range_bins(Some(2019.0), Some(2019.0), 1.0, 24), vec![2019]);
    }

    #[test]
    fn test_open_range_is_capped() {
        let bins = range_bins(None, Some(50_000.0), 10_000.0, 4);
        assert_eq!(bins, vec![2, 3, 4, 5]);

        let bins = range_bins(Some(2018.0), None, 1.0, 3);
        assert_eq!(bins, vec![2018, 2019, 2020]);

        assert!(range_bins(None, None, 1.0, 24).is_empty());
    }

    #[test]
    fn test_wide_range_is_sampled() {
        let bins = range_bins(Some(0.0), Some(99.0), 1.0, 5);
        assert_eq!(bins.len(), 5);
        assert_eq!(bins.first(), Some(&0));
        assert_eq!(bins.last(), Some(&99));
    }

    #[test]
    fn test_huge_range_is_sampled_without_overflow() {
        let bins = range_bins(Some(0.0), Some(1e300), 5_000.0, 24);
        assert_eq!(bins.len(), 24);
        assert_eq!(bins.first(), Some(&0));
        assert_eq!(bins.last(), Some(&bin_index(1e300, 5_000.0)));
        assert!(bins.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(range_bins(Some(-1e300), Some(1e300), 1.0, 3), vec![i64::MIN, 0, i64::MAX]);
    }

    #[test]
    fn test_open_range_at_bin_space_edge() {
        assert_eq!(range_bins(Some(1e300), None, 1.0, 24), vec![i64::MAX]);
        assert_eq!(range_bins(None, Some(-1e300), 1.0, 24), vec![i64::MIN]);

        let near_top = (i64::MAX - 1) as f64;
        let bins = range_bins(Some(near_top), None, 1.0, 4);
        assert!(!bins.is_empty() && bins.len() <= 4);
        assert_eq!(bins.last(), Some(&i64::MAX));
    }
}
