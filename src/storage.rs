use crate::dataset::DatasetResult;
use crate::errors::{AppError, ResultExt};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;

/// Fixed name of the registered-deaths append target.
const DEATHS_TABLE: &str = "regdeaths";

async fn open_pool(db_path: &Path) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .context("opening sqlite database")?;
    Ok(pool)
}

/// Appends a result's observation rows to the local registered-deaths
/// table. No schema migration, no dedup: repeated saves append again.
///
/// # Arguments
///
/// * `result` - The decoded dataset to save.
/// * `db_path` - Path to the sqlite file; created when missing.
pub async fn save_table(result: &DatasetResult, db_path: &Path) -> Result<(), AppError> {
    let pool = open_pool(db_path).await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS regdeaths (
            region TEXT NOT NULL,
            cause TEXT,
            age TEXT NOT NULL,
            sex TEXT NOT NULL,
            year TEXT NOT NULL,
            value REAL
        )",
    )
    .execute(&pool)
    .await
    .context("creating regdeaths table")?;

    for row in &result.table.rows {
        sqlx::query(
            "INSERT INTO regdeaths (region, cause, age, sex, year, value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&row.region)
        .bind(&row.cause)
        .bind(&row.age)
        .bind(&row.sex)
        .bind(&row.year)
        .bind(row.value)
        .execute(&pool)
        .await
        .context("appending observation row")?;
    }

    tracing::info!(
        "Appended {} rows to {} in {}",
        result.table.rows.len(),
        DEATHS_TABLE,
        db_path.display()
    );
    Ok(())
}

/// Writes a result's dimension metadata to a file as JSON, in source order.
pub fn save_dimensions(result: &DatasetResult, path: &Path) -> Result<(), AppError> {
    let json = serde_json::to_string(&result.dimensions.to_json())
        .map_err(|e| AppError::MissingData(format!("serializing dimensions: {}", e)))?;
    std::fs::write(path, json)
        .map_err(|e| AppError::MissingData(format!("writing {}: {}", path.display(), e)))?;
    tracing::info!("Wrote dimension metadata to {}", path.display());
    Ok(())
}
