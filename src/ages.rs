use crate::errors::AppError;
use indexmap::IndexMap;

const EN_DASH: char = '\u{2013}';

/// Which source table's age partitioning a band list follows.
///
/// The mortality and population tables partition ages differently; bands
/// from one vocabulary are not valid filter values for the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeVocabulary {
    Mortality,
    Population,
}

/// The fixed ordered list of age-interval codes for one vocabulary.
///
/// Mortality: `0`, `1-4`, five-year bands up to `85-89`, then `90+`.
/// Population: open-ended `-4`, five-year bands up to `80-84`, then `85+`.
pub fn age_bands(vocab: AgeVocabulary) -> Vec<String> {
    match vocab {
        AgeVocabulary::Mortality => {
            let mut bands = vec!["0".to_string(), "1-4".to_string()];
            bands.extend((1..18).map(|i| format!("{}-{}", i * 5, i * 5 + 4)));
            bands.push("90+".to_string());
            bands
        }
        AgeVocabulary::Population => {
            let mut bands = vec!["-4".to_string()];
            bands.extend((1..17).map(|i| format!("{}-{}", i * 5, i * 5 + 4)));
            bands.push("85+".to_string());
            bands
        }
    }
}

/// Mapping from each population band to the mortality band(s) it covers.
///
/// The population table splits the youngest and oldest ages more coarsely
/// than the mortality table, so `-4` and `85+` each cover two mortality
/// bands; all five-year bands map one to one. Used to rewrite a population
/// table's age column into the mortality vocabulary before joint
/// aggregation.
pub fn age_band_merge_table() -> IndexMap<String, Vec<String>> {
    let mut table = IndexMap::new();
    for band in age_bands(AgeVocabulary::Population) {
        let targets = match band.as_str() {
            "-4" => vec!["0".to_string(), "1-4".to_string()],
            "85+" => vec!["85-89".to_string(), "90+".to_string()],
            _ => vec![band.clone()],
        };
        table.insert(band, targets);
    }
    table
}

/// A contiguous run of mortality-vocabulary age bands with a display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeSlice {
    /// The bands from `start` to `end` inclusive, in vocabulary order.
    pub bands: Vec<String>,
    /// Human-readable span, e.g. `1–19` (en-dash).
    pub label: String,
}

/// Returns the contiguous mortality bands from `start` to `end` inclusive,
/// by list position, plus a label joining the outer sub-bounds.
///
/// # Arguments
///
/// * `start` - First band of the slice (mortality vocabulary).
/// * `end` - Last band of the slice, at or after `start`.
pub fn age_slice(start: &str, end: &str) -> Result<AgeSlice, AppError> {
    let vocabulary = age_bands(AgeVocabulary::Mortality);
    let start_pos = vocabulary
        .iter()
        .position(|b| b == start)
        .ok_or_else(|| AppError::BadRequest(format!("unknown age band: {}", start)))?;
    let end_pos = vocabulary
        .iter()
        .position(|b| b == end)
        .ok_or_else(|| AppError::BadRequest(format!("unknown age band: {}", end)))?;
    if end_pos < start_pos {
        return Err(AppError::BadRequest(format!(
            "age band {} precedes {}",
            end, start
        )));
    }

    let bands: Vec<String> = vocabulary[start_pos..=end_pos].to_vec();
    let label = if start_pos == end_pos {
        start.replace('-', &EN_DASH.to_string())
    } else {
        let lower = start.split('-').next().unwrap_or(start);
        let upper = end.rsplit('-').next().unwrap_or(end);
        format!("{}{}{}", lower, EN_DASH, upper)
    };

    Ok(AgeSlice { bands, label })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mortality_vocabulary_shape() {
        let bands = age_bands(AgeVocabulary::Mortality);
        assert_eq!(bands.len(), 20);
        assert_eq!(bands[0], "0");
        assert_eq!(bands[1], "1-4");
        assert_eq!(bands[2], "5-9");
        assert_eq!(bands[18], "85-89");
        assert_eq!(bands[19], "90+");
    }

    #[test]
    fn population_vocabulary_shape() {
        let bands = age_bands(AgeVocabulary::Population);
        assert_eq!(bands.len(), 18);
        assert_eq!(bands[0], "-4");
        assert_eq!(bands[1], "5-9");
        assert_eq!(bands[16], "80-84");
        assert_eq!(bands[17], "85+");
    }

    #[test]
    fn merge_table_covers_both_vocabularies() {
        let table = age_band_merge_table();
        // Every population band maps to at least one mortality band.
        let mortality = age_bands(AgeVocabulary::Mortality);
        for band in age_bands(AgeVocabulary::Population) {
            let targets = table.get(&band).unwrap();
            assert!(!targets.is_empty());
            for t in targets {
                assert!(mortality.contains(t), "{} not a mortality band", t);
            }
        }
        // Every mortality band is reached by at least one population band.
        for band in &mortality {
            assert!(
                table.values().any(|targets| targets.contains(band)),
                "{} unreachable from population vocabulary",
                band
            );
        }
    }

    #[test]
    fn terminal_bands_split_in_two() {
        let table = age_band_merge_table();
        assert_eq!(table["-4"], vec!["0", "1-4"]);
        assert_eq!(table["85+"], vec!["85-89", "90+"]);
        assert_eq!(table["40-44"], vec!["40-44"]);
    }

    #[test]
    fn single_band_slice() {
        let slice = age_slice("1-4", "1-4").unwrap();
        assert_eq!(slice.bands, vec!["1-4"]);
        assert_eq!(slice.label, "1\u{2013}4");

        let slice = age_slice("0", "0").unwrap();
        assert_eq!(slice.bands, vec!["0"]);
        assert_eq!(slice.label, "0");
    }

    #[test]
    fn full_range_slice_is_whole_vocabulary() {
        let slice = age_slice("0", "90+").unwrap();
        assert_eq!(slice.bands, age_bands(AgeVocabulary::Mortality));
        assert_eq!(slice.label, "0\u{2013}90+");
    }

    #[test]
    fn interior_slice_label_joins_outer_bounds() {
        let slice = age_slice("1-4", "15-19").unwrap();
        assert_eq!(slice.bands, vec!["1-4", "5-9", "10-14", "15-19"]);
        assert_eq!(slice.label, "1\u{2013}19");
    }

    #[test]
    fn unknown_or_reversed_bands_rejected() {
        assert!(age_slice("2-3", "15-19").is_err());
        assert!(age_slice("15-19", "1-4").is_err());
    }
}
