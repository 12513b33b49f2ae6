//! # ttlkv
//!
//! An in-memory key/value store with absolute-time expiry, served over a
//! newline-delimited JSON protocol on TCP.
//!
//! Items carry an expiration instant. Reads never return a dead item, and a
//! background reaper removes dead items from memory. On shutdown the store is
//! written to a backup file, which is loaded again on the next start.

pub mod client;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod protocol;
pub mod server;
pub mod service;
pub mod store;
