use crate::ages::{age_band_merge_table, age_bands, AgeVocabulary};
use crate::config::Config;
use crate::dataset::{decode_dataset, DatasetResult};
use crate::errors::AppError;
use crate::query::{deaths_query, population_query, QueryBody};
use crate::regions::TableMetadata;
use std::time::Duration;

/// Default sex codes: men, women.
pub fn all_sexes() -> Vec<String> {
    vec!["1".to_string(), "2".to_string()]
}

/// Client for the statistics service's table and metadata endpoints.
#[derive(Clone)]
pub struct ScbClient {
    client: reqwest::Client,
    mortality_url: String,
    population_url: String,
}

impl ScbClient {
    /// Creates a new `ScbClient` from configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Endpoint configuration.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            mortality_url: config.mortality_url.clone(),
            population_url: config.population_url.clone(),
        })
    }

    /// Fetches the variable catalog for a table endpoint.
    ///
    /// # Arguments
    ///
    /// * `url` - The table endpoint; the service serves its catalog on GET.
    pub async fn metadata(&self, url: &str) -> Result<TableMetadata, AppError> {
        tracing::info!("Fetching table metadata: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::ExternalApiError(format!("Metadata request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Metadata endpoint returned {}: {}",
                status, error_text
            )));
        }

        let metadata = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse metadata: {}", e))
        })?;

        Ok(metadata)
    }

    /// Catalog of the mortality table.
    pub async fn mortality_metadata(&self) -> Result<TableMetadata, AppError> {
        self.metadata(&self.mortality_url).await
    }

    /// Catalog of the population table.
    pub async fn population_metadata(&self) -> Result<TableMetadata, AppError> {
        self.metadata(&self.population_url).await
    }

    async fn post_query(&self, url: &str, body: &QueryBody) -> Result<DatasetResult, AppError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Table request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Table endpoint returned {}: {}",
                status, error_text
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse table response: {}", e))
        })?;

        decode_dataset(&body)
    }

    /// Fetches death counts by cause, region, age, sex and year.
    ///
    /// Any non-success status is a hard failure; there is no retry.
    ///
    /// # Arguments
    ///
    /// * `regions` - Region codes, all at one administrative level.
    /// * `causes` - Cause codes (leaf or aggregate chapters).
    /// * `ages` - Mortality-vocabulary age bands.
    /// * `sexes` - Sex codes.
    /// * `years` - Year codes.
    pub async fn fetch_deaths(
        &self,
        regions: &[String],
        causes: &[String],
        ages: &[String],
        sexes: &[String],
        years: &[String],
    ) -> Result<DatasetResult, AppError> {
        let body = deaths_query(regions, causes, ages, sexes, years)?;
        tracing::info!(
            "Fetching deaths for {} region(s), cause(s) {:?}",
            regions.len(),
            causes
        );
        self.post_query(&self.mortality_url, &body).await
    }

    /// `fetch_deaths` over the full age vocabulary, both sexes.
    pub async fn fetch_deaths_all_ages(
        &self,
        regions: &[String],
        causes: &[String],
        years: &[String],
    ) -> Result<DatasetResult, AppError> {
        self.fetch_deaths(
            regions,
            causes,
            &age_bands(AgeVocabulary::Mortality),
            &all_sexes(),
            years,
        )
        .await
    }

    /// Fetches population counts and realigns the age column to the
    /// mortality vocabulary via the merge table, so downstream filtering
    /// uses one band vocabulary throughout.
    pub async fn fetch_population(
        &self,
        regions: &[String],
        ages: &[String],
        sexes: &[String],
        years: &[String],
    ) -> Result<DatasetResult, AppError> {
        let body = population_query(regions, ages, sexes, years)?;
        tracing::info!("Fetching population for {} region(s)", regions.len());
        let mut result = self.post_query(&self.population_url, &body).await?;
        result.table.realign_ages(&age_band_merge_table());
        Ok(result)
    }

    /// `fetch_population` over the full population age vocabulary, both sexes.
    pub async fn fetch_population_all_ages(
        &self,
        regions: &[String],
        years: &[String],
    ) -> Result<DatasetResult, AppError> {
        self.fetch_population(
            regions,
            &age_bands(AgeVocabulary::Population),
            &all_sexes(),
            years,
        )
        .await
    }
}
