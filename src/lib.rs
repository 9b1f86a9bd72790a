// src/lib.rs

//! bidwatch: tender announcement monitor library

pub mod adapters;
pub mod error;
pub mod matcher;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

pub use error::{AppError, Result};
pub use pipeline::{CycleOutcome, Monitor};
