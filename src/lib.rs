// ABOUTME: Library root for skiff - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod command;
pub mod config;
pub mod credential;
pub mod deploy;
pub mod error;
pub mod output;
pub mod release;
pub mod revision;
pub mod swap;
pub mod transport;
