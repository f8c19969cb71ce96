// crates/core/src/lib.rs
//! Domain types, error taxonomy, external-AI provider traits, path
//! resolution and configuration loading shared by every other crate in
//! the workspace. This crate has no I/O of its own beyond environment
//! variable reads in `config`.

pub mod config;
pub mod error;
pub mod export;
pub mod paths;
pub mod provider;
pub mod tokens;
pub mod types;

pub use error::{McpError, ProviderError};
pub use types::*;
