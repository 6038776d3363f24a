//! Swedish regional mortality analytics.
//!
//! Retrieves cause-of-death and population statistics from the national
//! statistics API, reshapes the json-stat responses into flat observation
//! tables, and renders comparative visualizations of cause-specific
//! mortality against a denominator (total deaths or population).
//!
//! # Modules
//!
//! - `ages`: Age-band vocabularies of the two source tables and their merge table.
//! - `analysis`: Ratio series, smoothing and percentile tiers.
//! - `config`: Endpoint and collaborator-file configuration.
//! - `dataset`: json-stat decoding into flat observation tables.
//! - `errors`: Error handling types.
//! - `geo`: Shapefile and region-code translation collaborators.
//! - `obs`: Observability and logging.
//! - `plots`: Trend, scatter and choropleth renderers.
//! - `query`: Typed query payloads for the table endpoints.
//! - `regions`: Region-code classification and catalog filtering.
//! - `scb_client`: Statistics-service HTTP client.
//! - `scenarios`: Scenario bundle constructors driving one presentation call.
//! - `storage`: Local sqlite append and dimension dumps.

pub mod ages;
pub mod analysis;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod geo;
pub mod obs;
pub mod plots;
pub mod query;
pub mod regions;
pub mod scb_client;
pub mod scenarios;
pub mod storage;
