//! localshare: share files on the local network through expiring,
//! revocable links.
//!
//! The [`share`] module owns storage and the share lifecycle; [`server`]
//! exposes it over HTTP.

pub mod config;
pub mod logging;
pub mod server;
pub mod share;
