//! Storage Layer
//!
//! Handles all data persistence: the SQLite database, the repository
//! traits over it, and the JSON config file.

pub mod config;
pub mod database;
pub mod repository;

pub use config::*;
pub use database::*;
pub use repository::*;
