//! API module
//!
//! HTTP server and client for the rebloom service.

pub mod client;
pub mod server;

pub use client::{Client, ClientConfig, ClientError};
pub use server::{serve, ServerConfig};
