//! HTTP inbound adapter exposing REST endpoints.

pub mod error;
pub mod health;
pub mod image_edit;
pub mod schemas;
pub mod state;

pub use error::ApiResult;
