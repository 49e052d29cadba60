// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Vaultkeeper: image reorganizer for note vaults
//!
//! Finds every image embedded in a vault's notes, moves each image next to
//! the note that references it, gives it a meaningful name (AI vision or
//! text models, with local fallbacks) and rewrites every reference so the
//! vault stays consistent. Every run can be previewed, and real runs are
//! backed up first.

pub mod apply;
pub mod backup;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod journal;
pub mod model;
pub mod naming;
pub mod paths;
pub mod plan;
pub mod provider;
pub mod resolver;
pub mod scanner;
pub mod summary;
pub mod vault;

pub use config::AppConfig;
pub use engine::{Engine, RunReport};
pub use error::{Result, VaultkeeperError};
