use crate::analysis::Denominator;
use crate::config::Config;
use crate::dataset::DatasetResult;
use crate::errors::AppError;
use crate::geo::RegionShapes;
use crate::query::year_range;
use crate::scb_client::ScbClient;
use indexmap::IndexMap;

/// All-causes total in the cause taxonomy.
pub const TOTAL_CAUSE: &str = "TOT";

/// First and last year of the mortality table's span.
pub const DEFAULT_START_YEAR: u16 = 1969;
pub const DEFAULT_END_YEAR: u16 = 1996;

/// Everything one presentation call needs: the two tables, their dimension
/// trees, and the cause selection. Assembled per analysis, discarded after
/// plotting.
#[derive(Debug, Clone)]
pub struct ScenarioBundle {
    pub numerator: DatasetResult,
    pub denominator: DatasetResult,
    pub numerator_cause: String,
    pub denominator_kind: Denominator,
    /// Set for single-region trend scenarios.
    pub region: Option<String>,
    /// Set for map scenarios.
    pub shapefile_path: Option<String>,
}

impl ScenarioBundle {
    /// Region code -> label mapping of the numerator table, source order.
    pub fn region_labels(&self) -> Result<&IndexMap<String, String>, AppError> {
        self.numerator.dimensions.labels("Region")
    }

    /// Loads the polygon records the map scenario joins against, from the
    /// bundle's shapefile or, failing that, the configured one.
    pub fn load_shapes(&self, config: &Config) -> Result<RegionShapes, AppError> {
        let path = self
            .shapefile_path
            .as_deref()
            .or(config.shapefile_path.as_deref())
            .ok_or_else(|| AppError::MissingData("no shapefile configured".to_string()))?;
        RegionShapes::from_shapefile(path, &config.shape_unit_field, &config.shape_end_year_field)
    }
}

/// One cause against total deaths in one region, over the table's full
/// year span. Drives the trend plot.
pub async fn cause_vs_total_trend(
    client: &ScbClient,
    region: &str,
    cause: &str,
) -> Result<ScenarioBundle, AppError> {
    let regions = vec![region.to_string()];
    let years = year_range(DEFAULT_START_YEAR, DEFAULT_END_YEAR);
    let numerator = client
        .fetch_deaths_all_ages(&regions, &[cause.to_string()], &years)
        .await?;
    let denominator = client
        .fetch_deaths_all_ages(&regions, &[TOTAL_CAUSE.to_string()], &years)
        .await?;
    Ok(ScenarioBundle {
        numerator,
        denominator,
        numerator_cause: cause.to_string(),
        denominator_kind: Denominator::Cause(TOTAL_CAUSE.to_string()),
        region: Some(region.to_string()),
        shapefile_path: None,
    })
}

/// One cause against total deaths across many regions in one year window.
/// Drives the two-sex scatter plot.
pub async fn cause_vs_total_by_region(
    client: &ScbClient,
    regions: &[String],
    cause: &str,
    start_year: u16,
    end_year: u16,
) -> Result<ScenarioBundle, AppError> {
    let years = year_range(start_year, end_year);
    let numerator = client
        .fetch_deaths_all_ages(regions, &[cause.to_string()], &years)
        .await?;
    let denominator = client
        .fetch_deaths_all_ages(regions, &[TOTAL_CAUSE.to_string()], &years)
        .await?;
    Ok(ScenarioBundle {
        numerator,
        denominator,
        numerator_cause: cause.to_string(),
        denominator_kind: Denominator::Cause(TOTAL_CAUSE.to_string()),
        region: None,
        shapefile_path: None,
    })
}

/// Like [`cause_vs_total_by_region`], carrying the shapefile the map will
/// join against.
pub async fn cause_vs_total_map(
    client: &ScbClient,
    regions: &[String],
    cause: &str,
    start_year: u16,
    end_year: u16,
    shapefile_path: &str,
) -> Result<ScenarioBundle, AppError> {
    let mut bundle =
        cause_vs_total_by_region(client, regions, cause, start_year, end_year).await?;
    bundle.shapefile_path = Some(shapefile_path.to_string());
    Ok(bundle)
}

/// One cause against population counts in one region. The population
/// table's age column arrives realigned to the mortality vocabulary.
pub async fn cause_vs_population_trend(
    client: &ScbClient,
    region: &str,
    cause: &str,
    start_year: u16,
    end_year: u16,
) -> Result<ScenarioBundle, AppError> {
    let regions = vec![region.to_string()];
    let years = year_range(start_year, end_year);
    let numerator = client
        .fetch_deaths_all_ages(&regions, &[cause.to_string()], &years)
        .await?;
    let denominator = client.fetch_population_all_ages(&regions, &years).await?;
    Ok(ScenarioBundle {
        numerator,
        denominator,
        numerator_cause: cause.to_string(),
        denominator_kind: Denominator::Population,
        region: Some(region.to_string()),
        shapefile_path: None,
    })
}
