//! NovelHub: a novel catalog and reading service.
//!
//! Administrators manage authors, genres, novels, chapters and ad
//! placements; readers browse, search and read chapters while their
//! progress is tracked per novel.
//!
//! # Features
//!
//! - Typed RPC procedures over HTTP (`/rpc/{procedure}`)
//! - SQLite storage with derived chapter and view counters
//! - One reading-progress row per reader and novel
//! - Filtered, paginated novel search
//! - Session tokens with optional admin enforcement

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Password hashing and sessions.
pub mod auth;
/// Catalog handlers and procedure inputs.
pub mod catalog;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Procedure router.
pub mod rpc;
/// HTTP server.
pub mod server;

#[cfg(test)]
mod tests;

pub use catalog::CatalogService;
pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use rpc::{Procedure, RpcContext, RpcRouter};
pub use server::AppState;
