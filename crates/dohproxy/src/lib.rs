//! DNS-over-HTTPS proxy: a thin HTTP front-end that unpacks a DNS message
//! from the request body, forwards it to the configured upstream resolver,
//! and returns the packed reply.

pub mod config;
pub mod proxy;

pub use config::{Config, ConfigError};
pub use proxy::{router, Upstream};
