//! QuickClips Core - Rust engine for the Quick Clips feature
//!
//! Scans clip text with user-authored search terms, opens quick tools built
//! from the matches, and expands templates from clips and captures. Search
//! terms, tools and templates are persisted through a small storage trait.
//!
//! Types are exported via UniFFI proc-macros (#[derive(uniffi::Record/Enum)]).

pub mod compiler;
pub mod database;
mod debounce;
pub mod dispatch;
pub mod interface;
pub mod models;
pub mod repository;
pub mod scanner;
pub mod session;
mod store;
pub mod tokens;
pub mod transfer;
pub mod validation;

pub use database::{CollectionKind, ConfigStorage, Database, MemoryStorage};
pub use interface::*;
pub use store::QuickClipsStore;

uniffi::setup_scaffolding!("quickclips");
