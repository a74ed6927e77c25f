//! SeeCats: a workflow engine that reacts to newly stored images.
//!
//! A trigger event starts an execution of a state-machine definition
//! ([`core::workflow_graph`]); the built-in pipeline classifies the image,
//! branches on the detected label and fans out notification and collage work.

pub mod cli;
pub mod core;
pub mod logging;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub type Result<T> = std::result::Result<T, anyhow::Error>;
