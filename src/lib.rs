//! geoseries: incremental per-subdivision raster time series
//!
//! Keeps a cumulative metrics table (one row per subdivision, one column per period)
//! in step with a container of periodic source rasters. Each run finds the periods
//! with a raster but no column, aggregates them, writes a new table snapshot through an
//! asynchronous export job and publishes the results for public read.

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod logging;
pub mod naming;
pub mod period;
pub mod pipeline;
pub mod platform;
pub mod publish;
pub mod table;
pub mod telemetry;
pub mod update;
