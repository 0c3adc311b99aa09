//! ETL pipeline - fetch, normalize, emit, publish

pub mod emit;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod publish;
pub mod reports;
pub mod types;

pub use error::PipelineError;
pub use types::*;
