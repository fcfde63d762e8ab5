pub mod analysis;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod history;
pub mod logging;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod watchlist;

pub use error::{Error, Result};
