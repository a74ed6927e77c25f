//! Sinks installed by [`crate::logging::init`]. Each builder returns a boxed
//! layer over the bare registry so the enabled ones can be collected into one
//! `Vec` instead of a typed stack.

use tracing_subscriber::layer::Layer;

pub mod console;
pub mod file;
pub mod otlp;

pub type BoxLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;
