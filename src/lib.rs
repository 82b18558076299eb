//! Region resolution and listing search for the Daangn neighborhood marketplace.
//!
//! The pipeline runs in three steps:
//! 1. [`address`] turns the government address table into search queries.
//! 2. [`resolver`] types each query into the marketplace's location search
//!    and records the region codes it links to.
//! 3. [`search`] queries the listings endpoint per region, filters and
//!    deduplicates the results, and [`export`] writes them out.

pub mod address;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod regions;
pub mod resolver;
pub mod scrapers;
pub mod search;

pub use error::ScoutError;
