//! Barkeep Client
//!
//! HTTP transport for the Barkeep recommendation service.

pub mod http;

pub use http::HttpSessionClient;
