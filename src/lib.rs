pub mod augment;
pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod logging;
pub mod run;
pub mod stats;
pub mod transforms;
