//! Keeps a handful of files (game saves, typically) in sync between a local
//! directory and an object store, from any number of machines.
//!
//! Every file is fingerprinted and compared against two records: what this
//! machine last synced (the local store) and what all machines last agreed on
//! (the remote store). `reconcile::decide` turns the three into an action and
//! `propagate::Syncer` carries it out.

#[macro_use]
extern crate log;

pub mod archive;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod propagate;
pub mod reconcile;
pub mod scan;
pub mod state;
pub mod store;
pub mod transfer;
pub mod util;
