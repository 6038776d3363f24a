use crate::errors::AppError;
use serde::Deserialize;
use shapefile::dbase::FieldValue;
use std::collections::HashMap;
use std::path::Path;

/// One row of the region-code translation table.
#[derive(Debug, Deserialize)]
struct TranslationRow {
    /// Statistics-service region code.
    region: String,
    /// Geometry store unit identifier.
    unit: String,
}

/// Mapping between statistics-service region codes and the geometry
/// store's unit identifiers. Loaded once, read-only.
#[derive(Debug, Clone, Default)]
pub struct RegionTranslator {
    region_to_unit: HashMap<String, String>,
    unit_to_region: HashMap<String, String>,
}

impl RegionTranslator {
    /// Loads the translation table from a two-column csv (`region,unit`).
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let mut translator = Self::default();
        for row in reader.deserialize::<TranslationRow>() {
            let row = row?;
            translator
                .region_to_unit
                .insert(row.region.clone(), row.unit.clone());
            translator.unit_to_region.insert(row.unit, row.region);
        }
        tracing::info!(
            "Loaded {} region translations",
            translator.region_to_unit.len()
        );
        Ok(translator)
    }

    pub fn unit_for(&self, region: &str) -> Option<&str> {
        self.region_to_unit.get(region).map(String::as_str)
    }

    pub fn region_for(&self, unit: &str) -> Option<&str> {
        self.unit_to_region.get(unit).map(String::as_str)
    }
}

/// One polygon record from the geometry store.
#[derive(Debug, Clone)]
pub struct RegionShape {
    /// Administrative unit code from the record attributes.
    pub unit_code: String,
    /// Last year the boundary was valid, when the store records one.
    pub end_year: Option<i32>,
    /// Polygon rings as coordinate sequences (outer rings first).
    pub rings: Vec<Vec<(f64, f64)>>,
    /// (xmin, ymin, xmax, ymax) over all rings.
    pub bounds: (f64, f64, f64, f64),
}

impl RegionShape {
    /// Whether the boundary is still valid in the given year. Records
    /// without an end year never expire.
    pub fn valid_in(&self, year: i32) -> bool {
        self.end_year.map_or(true, |end| end >= year)
    }
}

fn field_as_string(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(Some(s)) => Some(s.trim().to_string()),
        FieldValue::Numeric(Some(n)) => {
            if n.fract() == 0.0 {
                Some(format!("{}", *n as i64))
            } else {
                Some(n.to_string())
            }
        }
        FieldValue::Integer(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field_as_year(value: &FieldValue) -> Option<i32> {
    match value {
        FieldValue::Numeric(Some(n)) => Some(*n as i32),
        FieldValue::Integer(n) => Some(*n),
        FieldValue::Character(Some(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn bounds_of(rings: &[Vec<(f64, f64)>]) -> (f64, f64, f64, f64) {
    let mut bounds = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for ring in rings {
        for &(x, y) in ring {
            bounds.0 = bounds.0.min(x);
            bounds.1 = bounds.1.min(y);
            bounds.2 = bounds.2.max(x);
            bounds.3 = bounds.3.max(y);
        }
    }
    bounds
}

/// All usable polygon records of one shapefile.
#[derive(Debug, Clone, Default)]
pub struct RegionShapes {
    pub shapes: Vec<RegionShape>,
}

impl RegionShapes {
    /// Reads polygon records and their attributes from a shapefile.
    ///
    /// Records without the unit-code attribute or without polygon geometry
    /// are skipped silently.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the `.shp` file (a `.dbf` sibling must exist).
    /// * `unit_field` - Attribute holding the administrative unit code.
    /// * `end_year_field` - Attribute holding the validity end year.
    pub fn from_shapefile(
        path: impl AsRef<Path>,
        unit_field: &str,
        end_year_field: &str,
    ) -> Result<Self, AppError> {
        let mut reader = shapefile::Reader::from_path(path.as_ref())?;
        let mut shapes = Vec::new();
        for pair in reader.iter_shapes_and_records() {
            let (shape, record) = pair?;
            let polygon = match shape {
                shapefile::Shape::Polygon(p) => p,
                _ => continue,
            };
            let unit_code = match record.get(unit_field).and_then(field_as_string) {
                Some(code) => code,
                None => continue,
            };
            let end_year = record.get(end_year_field).and_then(field_as_year);

            let rings: Vec<Vec<(f64, f64)>> = polygon
                .rings()
                .iter()
                .map(|ring| ring.points().iter().map(|p| (p.x, p.y)).collect())
                .collect();
            if rings.is_empty() {
                continue;
            }
            let bounds = bounds_of(&rings);
            shapes.push(RegionShape {
                unit_code,
                end_year,
                rings,
                bounds,
            });
        }
        tracing::info!(
            "Loaded {} region polygons from {}",
            shapes.len(),
            path.as_ref().display()
        );
        Ok(Self { shapes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn translator_round_trips_codes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "region,unit").unwrap();
        writeln!(file, "01,LAN01").unwrap();
        writeln!(file, "25,LAN25").unwrap();
        let translator = RegionTranslator::from_csv_path(file.path()).unwrap();
        assert_eq!(translator.unit_for("01"), Some("LAN01"));
        assert_eq!(translator.region_for("LAN25"), Some("25"));
        assert_eq!(translator.unit_for("99"), None);
    }

    #[test]
    fn missing_translation_file_is_a_geo_error() {
        let err = RegionTranslator::from_csv_path("/nonexistent/translation.csv")
            .err()
            .unwrap();
        match err {
            AppError::GeoError(message) => assert!(message.starts_with("translation table:")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn validity_window() {
        let shape = RegionShape {
            unit_code: "LAN01".to_string(),
            end_year: Some(1995),
            rings: vec![vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]],
            bounds: (0.0, 0.0, 1.0, 1.0),
        };
        assert!(shape.valid_in(1990));
        assert!(shape.valid_in(1995));
        assert!(!shape.valid_in(1996));

        let open_ended = RegionShape {
            end_year: None,
            ..shape
        };
        assert!(open_ended.valid_in(2100));
    }

    #[test]
    fn bounds_cover_all_rings() {
        let rings = vec![
            vec![(0.0, 1.0), (2.0, 3.0)],
            vec![(-1.0, 0.5), (1.5, 4.0)],
        ];
        assert_eq!(bounds_of(&rings), (-1.0, 0.5, 2.0, 4.0));
    }
}
