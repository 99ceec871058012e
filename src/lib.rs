//! Repackage ZIP build artifacts inside a CodePipeline stage.
//!
//! The [`pipeline`] module holds the two transformations: pulling named
//! entries out of an archive, and grafting one archive into another under a
//! prefix. [`job`] wraps them as a pipeline action that fetches its input
//! from S3, stores the result and reports back to CodePipeline.

pub mod archive;
pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod s3;
pub mod select;

pub use error::{Error, Result};
