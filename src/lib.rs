pub mod api;
pub mod database;
pub mod error;
pub mod finra;
pub mod metrics;
pub mod models;
pub mod reconcile;
pub mod snapshot;
pub mod utils;

pub use error::{Result, SyncError};
