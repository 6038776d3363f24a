use serde::Deserialize;

/// Default mortality table endpoint (deaths by cause, region, age, sex, year).
pub const DEFAULT_MORTALITY_URL: &str =
    "http://api.scb.se/OV0104/v1/doris/sv/ssd/START/HS/HS0301/DodaOrsak";

/// Default population table endpoint (population by region, age, sex, year).
pub const DEFAULT_POPULATION_URL: &str =
    "http://api.scb.se/OV0104/v1/doris/sv/ssd/START/BE/BE0101/BE0101A/BefolkningR1860";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mortality_url: String,
    pub population_url: String,
    /// Path to the sqlite file used by the storage convenience functions.
    pub database_path: Option<String>,
    /// Path to the region polygon shapefile used by the choropleth map.
    pub shapefile_path: Option<String>,
    /// Path to the region-code translation table (statistics code -> shapefile unit code).
    pub translation_path: Option<String>,
    /// Shapefile attribute holding the administrative unit code.
    pub shape_unit_field: String,
    /// Shapefile attribute holding the record's validity end year.
    pub shape_end_year_field: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            mortality_url: std::env::var("MORTALITY_URL")
                .unwrap_or_else(|_| DEFAULT_MORTALITY_URL.to_string()),
            population_url: std::env::var("POPULATION_URL")
                .unwrap_or_else(|_| DEFAULT_POPULATION_URL.to_string()),
            database_path: std::env::var("MORTALITY_DB")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            shapefile_path: std::env::var("REGION_SHAPEFILE")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            translation_path: std::env::var("REGION_TRANSLATION")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            shape_unit_field: std::env::var("SHAPE_UNIT_FIELD")
                .unwrap_or_else(|_| "ID".to_string()),
            shape_end_year_field: std::env::var("SHAPE_END_YEAR_FIELD")
                .unwrap_or_else(|_| "TOYEAR".to_string()),
        };

        for (name, url) in [
            ("MORTALITY_URL", &config.mortality_url),
            ("POPULATION_URL", &config.population_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Mortality URL: {}", config.mortality_url);
        tracing::debug!("Population URL: {}", config.population_url);
        if let Some(ref db) = config.database_path {
            tracing::debug!("Database path: {}", db);
        }
        if let Some(ref shp) = config.shapefile_path {
            tracing::debug!("Shapefile path: {}", shp);
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mortality_url: DEFAULT_MORTALITY_URL.to_string(),
            population_url: DEFAULT_POPULATION_URL.to_string(),
            database_path: None,
            shapefile_path: None,
            translation_path: None,
            shape_unit_field: "ID".to_string(),
            shape_end_year_field: "TOYEAR".to_string(),
        }
    }
}
