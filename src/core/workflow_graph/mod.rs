//! State-machine workflow engine: definitions, validation, execution and intake.

pub mod builder;
pub mod capability;
pub mod condition;
pub mod dot;
pub mod executor;
pub mod expression;
pub mod operator;
pub mod operators;
pub mod path;
pub mod pipeline;
pub mod schema;
pub mod state;
pub mod store;
pub mod trace;
pub mod trigger;
pub mod validate;
pub mod webhook;
