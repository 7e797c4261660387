pub mod action;
pub mod admission;
pub mod busy;
pub mod coerce;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod shed_state;

pub use error::{HostdError, Result};
