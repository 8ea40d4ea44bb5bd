//! Data Models
//!
//! Contains all data structures used throughout the application.

pub mod document;
pub mod report;
pub mod settings;

pub use document::*;
pub use report::*;
pub use settings::*;
