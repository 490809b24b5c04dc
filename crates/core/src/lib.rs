//! Ad Console Core - Shared domain types.
//!
//! This crate provides the types used across all ad console components:
//! - `console` - Server-rendered admin console (axum)
//! - `cli` - `adctl` command-line client
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O and no
//! HTTP clients. The wire format of every record matches the advertising
//! backend's JSON, so the same types are used for requests, responses and
//! the persisted session.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, roles, capabilities, accounts and campaign records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
