//! Small shared utilities for the archive crates.
//!
//! - [`hash`]: hash containers with a fixed seed, so identifier hashes (and
//!   therefore hash-table slot placement) are reproducible between runs.
//! - [`num`]: alignment arithmetic used by the layout code.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

// -----------------------------------------------------------------------------
// Modules

pub mod hash;
pub mod num;
