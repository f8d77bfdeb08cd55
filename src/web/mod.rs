//! Web API module for the best-stories service.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod status;
pub mod stories;

pub use routes::*;
