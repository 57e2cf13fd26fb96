//! Client core for Parley: session identity, contact directory, and the
//! per-conversation reconciliation engine that merges fetched history,
//! optimistic sends and realtime inserts into one ordered view.

pub mod auth;
pub mod config;
pub mod conversation;
pub mod directory;
pub mod error;
pub mod http;
pub mod memory;
pub mod messenger;
pub mod realtime;
pub mod session;
pub mod store;

pub use error::{ClientError, Result};
