use crate::dataset::ObservationTable;
use std::collections::BTreeMap;

/// What the numerator counts are divided by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denominator {
    /// Deaths from a cause code (e.g. the all-causes total "TOT").
    Cause(String),
    /// Population counts; population rows have no cause dimension.
    Population,
}

/// Key the ratio series is indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// One ratio per year (trend over time).
    Year,
    /// One ratio per region (cross-sectional comparison).
    Region,
}

/// Row predicate shared by numerator and denominator.
#[derive(Debug, Clone, Default)]
pub struct SeriesFilter {
    /// Sex code; always required.
    pub sex: String,
    /// Restrict to one region (trend plots); `None` keeps all regions.
    pub region: Option<String>,
    /// Age bands to keep, mortality vocabulary.
    pub ages: Vec<String>,
    /// Years to keep; `None` keeps all years in the table.
    pub years: Option<Vec<String>>,
}

impl SeriesFilter {
    pub fn for_sex(sex: &str, ages: &[String]) -> Self {
        Self {
            sex: sex.to_string(),
            region: None,
            ages: ages.to_vec(),
            years: None,
        }
    }
}

/// Sums the value column per group after filtering.
///
/// Rows without a value contribute nothing to their group's sum. Group keys
/// sort lexically, which orders four-digit years and region codes correctly.
pub fn grouped_sum(
    table: &ObservationTable,
    cause: Option<&str>,
    filter: &SeriesFilter,
    group_by: GroupBy,
) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    for row in &table.rows {
        if row.sex != filter.sex {
            continue;
        }
        if let Some(wanted) = cause {
            if row.cause.as_deref() != Some(wanted) {
                continue;
            }
        }
        if let Some(ref region) = filter.region {
            if &row.region != region {
                continue;
            }
        }
        if !filter.ages.iter().any(|a| a == &row.age) {
            continue;
        }
        if let Some(ref years) = filter.years {
            if !years.iter().any(|y| y == &row.year) {
                continue;
            }
        }
        let key = match group_by {
            GroupBy::Year => row.year.clone(),
            GroupBy::Region => row.region.clone(),
        };
        *sums.entry(key).or_insert(0.0) += row.value.unwrap_or(0.0);
    }
    sums
}

/// Numerator-sum divided by denominator-sum per group.
///
/// The numerator is always filtered by its cause; a population denominator
/// is filtered without a cause predicate. A group whose denominator is
/// missing or sums to zero yields NaN, propagated rather than dropped.
pub fn ratio_series(
    numerator: &ObservationTable,
    numerator_cause: &str,
    denominator: &ObservationTable,
    denominator_kind: &Denominator,
    filter: &SeriesFilter,
    group_by: GroupBy,
) -> BTreeMap<String, f64> {
    let num_sums = grouped_sum(numerator, Some(numerator_cause), filter, group_by);
    let denom_cause = match denominator_kind {
        Denominator::Cause(code) => Some(code.as_str()),
        Denominator::Population => None,
    };
    let denom_sums = grouped_sum(denominator, denom_cause, filter, group_by);

    num_sums
        .into_iter()
        .map(|(key, num)| {
            let ratio = match denom_sums.get(&key) {
                Some(d) if *d != 0.0 => num / d,
                _ => f64::NAN,
            };
            (key, ratio)
        })
        .collect()
}

/// Smoothing span: fraction of the data window each local fit sees.
const LOWESS_FRACTION: f64 = 0.4;

/// Locally-weighted regression (tricube weights, local linear fit) over a
/// series, evaluated at each input position.
///
/// Returns (position, smoothed value) pairs in position order. Series
/// shorter than three points are returned unchanged.
pub fn smooth(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    let mut sorted: Vec<(f64, f64)> = points.to_vec();
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let window = ((LOWESS_FRACTION * n as f64).ceil() as usize).max(2);
    let mut out = Vec::with_capacity(n);
    for &(x0, _) in &sorted {
        let mut distances: Vec<f64> = sorted.iter().map(|&(x, _)| (x - x0).abs()).collect();
        distances.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let bandwidth = distances[window - 1].max(f64::EPSILON);

        // Weighted least squares for y = a + b*x around x0.
        let (mut sw, mut swx, mut swy, mut swxx, mut swxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for &(x, y) in &sorted {
            if !y.is_finite() {
                continue;
            }
            let d = ((x - x0) / bandwidth).abs();
            if d >= 1.0 {
                continue;
            }
            let w = (1.0 - d.powi(3)).powi(3);
            sw += w;
            swx += w * x;
            swy += w * y;
            swxx += w * x * x;
            swxy += w * x * y;
        }
        let det = sw * swxx - swx * swx;
        let fitted = if sw == 0.0 {
            f64::NAN
        } else if det.abs() < f64::EPSILON * swxx.max(1.0) {
            // Degenerate window (all points at one x): weighted mean.
            swy / sw
        } else {
            let slope = (sw * swxy - swx * swy) / det;
            let intercept = (swy - slope * swx) / sw;
            intercept + slope * x0
        };
        out.push((x0, fitted));
    }
    out
}

/// The p-th percentile of a dataset, linear interpolation between ranks.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (p / 100.0) * (sorted.len() as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        Some(sorted[lower])
    } else {
        let f = rank - lower as f64;
        Some((1.0 - f) * sorted[lower] + f * sorted[upper])
    }
}

/// Upper boundaries of the three map color tiers: the 33rd, 67th and 100th
/// percentiles of the finite ratios. NaN ratios are excluded from the
/// computation. `None` when no ratio is finite.
pub fn tier_bounds(ratios: &[f64]) -> Option<[f64; 3]> {
    let finite: Vec<f64> = ratios.iter().copied().filter(|v| v.is_finite()).collect();
    Some([
        percentile(&finite, 100.0 / 3.0)?,
        percentile(&finite, 200.0 / 3.0)?,
        percentile(&finite, 100.0)?,
    ])
}

/// The lowest tier whose boundary is at or above the value; `None` for NaN
/// or values beyond the top boundary.
pub fn tier_for(value: f64, bounds: &[f64; 3]) -> Option<usize> {
    if !value.is_finite() {
        return None;
    }
    bounds.iter().position(|b| value <= *b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Observation;

    fn row(region: &str, cause: Option<&str>, age: &str, sex: &str, year: &str, value: f64) -> Observation {
        Observation {
            region: region.to_string(),
            cause: cause.map(str::to_string),
            age: age.to_string(),
            sex: sex.to_string(),
            year: year.to_string(),
            value: Some(value),
        }
    }

    fn table(rows: Vec<Observation>) -> ObservationTable {
        ObservationTable { rows }
    }

    fn filter(sex: &str, ages: &[&str], years: Option<&[&str]>) -> SeriesFilter {
        SeriesFilter {
            sex: sex.to_string(),
            region: None,
            ages: ages.iter().map(|s| s.to_string()).collect(),
            years: years.map(|ys| ys.iter().map(|s| s.to_string()).collect()),
        }
    }

    #[test]
    fn literal_ratio_scenario() {
        let num = table(vec![row("01", Some("A"), "0", "1", "1970", 10.0)]);
        let denom = table(vec![row("01", Some("TOT"), "0", "1", "1970", 100.0)]);
        let series = ratio_series(
            &num,
            "A",
            &denom,
            &Denominator::Cause("TOT".to_string()),
            &filter("1", &["0"], Some(&["1970"])),
            GroupBy::Year,
        );
        assert_eq!(series.len(), 1);
        assert!((series["1970"] - 0.10).abs() < 1e-12);
    }

    #[test]
    fn zero_denominator_yields_nan() {
        let num = table(vec![row("01", Some("A"), "0", "1", "1970", 10.0)]);
        let denom = table(vec![row("01", Some("TOT"), "0", "1", "1970", 0.0)]);
        let series = ratio_series(
            &num,
            "A",
            &denom,
            &Denominator::Cause("TOT".to_string()),
            &filter("1", &["0"], Some(&["1970"])),
            GroupBy::Year,
        );
        assert!(series["1970"].is_nan());
    }

    #[test]
    fn missing_denominator_group_yields_nan() {
        let num = table(vec![row("01", Some("A"), "0", "1", "1971", 4.0)]);
        let denom = table(vec![row("01", Some("TOT"), "0", "1", "1970", 100.0)]);
        let series = ratio_series(
            &num,
            "A",
            &denom,
            &Denominator::Cause("TOT".to_string()),
            &filter("1", &["0"], None),
            GroupBy::Year,
        );
        assert!(series["1971"].is_nan());
    }

    #[test]
    fn population_denominator_needs_no_cause() {
        let num = table(vec![row("01", Some("A"), "0", "2", "1970", 5.0)]);
        let denom = table(vec![row("01", None, "0", "2", "1970", 50_000.0)]);
        let series = ratio_series(
            &num,
            "A",
            &denom,
            &Denominator::Population,
            &filter("2", &["0"], None),
            GroupBy::Year,
        );
        assert!((series["1970"] - 1e-4).abs() < 1e-15);
    }

    #[test]
    fn doubling_denominator_halves_ratio() {
        let num = table(vec![row("01", Some("A"), "0", "1", "1970", 10.0)]);
        let denom1 = table(vec![row("01", Some("TOT"), "0", "1", "1970", 100.0)]);
        let denom2 = table(vec![row("01", Some("TOT"), "0", "1", "1970", 200.0)]);
        let f = filter("1", &["0"], None);
        let kind = Denominator::Cause("TOT".to_string());
        let r1 = ratio_series(&num, "A", &denom1, &kind, &f, GroupBy::Year)["1970"];
        let r2 = ratio_series(&num, "A", &denom2, &kind, &f, GroupBy::Year)["1970"];
        assert!((r1 / 2.0 - r2).abs() < 1e-12);
    }

    #[test]
    fn grouped_sum_aggregates_ages_and_regions() {
        let t = table(vec![
            row("01", Some("A"), "0", "1", "1970", 1.0),
            row("01", Some("A"), "1-4", "1", "1970", 2.0),
            row("03", Some("A"), "0", "1", "1970", 4.0),
            row("01", Some("B"), "0", "1", "1970", 100.0),
            row("01", Some("A"), "0", "2", "1970", 100.0),
        ]);
        let sums = grouped_sum(
            &t,
            Some("A"),
            &filter("1", &["0", "1-4"], None),
            GroupBy::Region,
        );
        assert_eq!(sums["01"], 3.0);
        assert_eq!(sums["03"], 4.0);
    }

    #[test]
    fn grouped_sum_is_order_independent() {
        let rows = vec![
            row("01", Some("A"), "0", "1", "1970", 1.0),
            row("01", Some("A"), "1-4", "1", "1970", 2.0),
            row("01", Some("A"), "5-9", "1", "1970", 3.0),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();
        let f = filter("1", &["0", "1-4", "5-9"], None);
        assert_eq!(
            grouped_sum(&table(rows), Some("A"), &f, GroupBy::Year),
            grouped_sum(&table(reversed), Some("A"), &f, GroupBy::Year)
        );
    }

    #[test]
    fn smooth_reproduces_linear_series() {
        let points: Vec<(f64, f64)> =
            (0..10).map(|i| (i as f64, 3.0 + 2.0 * i as f64)).collect();
        let smoothed = smooth(&points);
        assert_eq!(smoothed.len(), points.len());
        for ((x, y), (sx, sy)) in points.iter().zip(&smoothed) {
            assert_eq!(x, sx);
            assert!((y - sy).abs() < 1e-6, "{} vs {}", y, sy);
        }
    }

    #[test]
    fn smooth_passes_short_series_through() {
        let points = vec![(1970.0, 0.5), (1971.0, 0.7)];
        assert_eq!(smooth(&points), points);
    }

    #[test]
    fn percentile_linear_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 50.0), Some(3.0));
        assert_eq!(percentile(&values, 100.0), Some(5.0));
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn tier_bounds_match_percentiles_of_exact_list() {
        let ratios = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let bounds = tier_bounds(&ratios).unwrap();
        assert_eq!(bounds[0], percentile(&ratios, 100.0 / 3.0).unwrap());
        assert_eq!(bounds[1], percentile(&ratios, 200.0 / 3.0).unwrap());
        assert_eq!(bounds[2], 0.6);
        // Every value lands in the lowest tier whose boundary covers it.
        for &v in &ratios {
            let tier = tier_for(v, &bounds).unwrap();
            assert!(v <= bounds[tier]);
            if tier > 0 {
                assert!(v > bounds[tier - 1]);
            }
        }
    }

    #[test]
    fn tier_bounds_ignore_nan() {
        let with_nan = [0.1, f64::NAN, 0.2, 0.3, f64::NAN, 0.4, 0.5, 0.6];
        let clean = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        assert_eq!(tier_bounds(&with_nan), tier_bounds(&clean));
        assert_eq!(tier_for(f64::NAN, &tier_bounds(&clean).unwrap()), None);
    }

    #[test]
    fn all_nan_ratios_have_no_bounds() {
        assert_eq!(tier_bounds(&[f64::NAN, f64::NAN]), None);
    }
}
