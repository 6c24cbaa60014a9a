//! Database schema, models and settings accessors

pub mod init;
pub mod models;
pub mod settings;

pub use init::*;
pub use models::*;
