//! # Stockbook - Spreadsheet Record Keeping Library
//!
//! Stockbook turns messy spreadsheet exports into a clean, audited record
//! store. It guesses how raw columns map onto a canonical schema,
//! normalizes the data (ids, quantities, dates, inferred categories), and
//! keeps every later mutation paired with an append-only audit entry.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use stockbook::{catalog, importer};
//!
//! # fn example() -> anyhow::Result<()> {
//! // Load whatever the member exported from their spreadsheet
//! let raw = importer::load_df(Path::new("uploaded.csv"))?;
//! let columns: Vec<String> = raw
//!     .get_column_names_str()
//!     .into_iter()
//!     .map(str::to_string)
//!     .collect();
//!
//! // Guess the column mapping, then normalize to the canonical schema
//! let mapping = importer::guess(&columns);
//! let styles = catalog::style_columns_in(&columns);
//! let items = importer::normalize(&raw, &mapping, &styles)?;
//! println!("{} records ready", items.height());
//! # Ok(())
//! # }
//! ```
//!
//! Mutations go through the registry, which records who did what:
//!
//! ```no_run
//! use stockbook::auth::{RequestContext, Role};
//! use stockbook::config::Settings;
//! use stockbook::registry::{NewRecord, Registry};
//!
//! # fn example() -> anyhow::Result<()> {
//! let registry = Registry::open(&Settings::load()?)?;
//! let ctx = RequestContext::new("admin", Role::Admin);
//! let id = registry.add(&ctx, &NewRecord {
//!     name: "初亀 純米".to_string(),
//!     member: "山田".to_string(),
//!     ..NewRecord::default()
//! })?;
//! println!("registered {id}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`catalog`]: Canonical schema, mapping keywords and style column names
//! - [`importer`]: File loading, mapping guesser, id reconciler, normalizer
//! - [`registry`]: Record store, mutations, audit log and list views
//! - [`auth`]: User directory and acting-user context
//! - [`config`]: Persistent application settings
//! - [`error`]: Error types and handling utilities
//! - [`logging`]: Console and rolling-file tracing setup

#![warn(clippy::all, rust_2018_idioms)]

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod importer;
pub mod logging;
pub mod registry;
