use crate::errors::AppError;
use serde::{Deserialize, Serialize};

/// Region code for the whole country; neither a county nor a municipality.
pub const NATIONWIDE: &str = "00";

/// Administrative level of a region code.
///
/// The statistics service encodes the level in the code itself: counties are
/// two digits, municipalities four (the first two being their county).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionLevel {
    County,
    Municipality,
}

/// Classifies a region code by the code-length convention.
///
/// Returns `None` for codes that are neither a county nor a municipality,
/// including the nationwide sentinel `"00"`.
pub fn classify(region: &str) -> Option<RegionLevel> {
    if region.len() == 2 && region != NATIONWIDE {
        Some(RegionLevel::County)
    } else if region.len() == 4 {
        Some(RegionLevel::Municipality)
    } else {
        None
    }
}

/// One variable (dimension) in a table's metadata catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    /// Dimension code (e.g. "Region", "Dodsorsak").
    pub code: String,
    /// Human-readable dimension name.
    pub text: String,
    /// Value codes, in source order.
    pub values: Vec<String>,
    /// Human-readable value labels, parallel to `values`.
    #[serde(rename = "valueTexts")]
    pub value_texts: Vec<String>,
}

/// Decoded variable catalog for one statistical table.
///
/// Order of variables and of their values is source-defined and preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMetadata {
    pub title: String,
    pub variables: Vec<Variable>,
}

impl TableMetadata {
    /// The region variable; by service convention the first in the catalog.
    fn region_variable(&self) -> Result<&Variable, AppError> {
        self.variables
            .first()
            .ok_or_else(|| AppError::MissingData("metadata has no variables".to_string()))
    }

    /// All region codes at the given administrative level, in source order.
    pub fn regions_at_level(&self, level: RegionLevel) -> Result<Vec<String>, AppError> {
        let region_var = self.region_variable()?;
        Ok(region_var
            .values
            .iter()
            .filter(|code| classify(code) == Some(level))
            .cloned()
            .collect())
    }

    /// Municipality codes belonging to the given county, in source order.
    pub fn municipalities_in_county(&self, county: &str) -> Result<Vec<String>, AppError> {
        let region_var = self.region_variable()?;
        Ok(region_var
            .values
            .iter()
            .filter(|code| {
                classify(code) == Some(RegionLevel::Municipality) && code.starts_with(county)
            })
            .cloned()
            .collect())
    }
}
