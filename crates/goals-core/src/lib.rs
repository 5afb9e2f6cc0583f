//! Core types and trait definitions for the daily goals tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Backends implement [`store::DocumentStore`] and
//! [`identity::IdentityProvider`]; everything above them (the entry adapter,
//! the month aggregator and the session manager) lives here.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod entries;
pub mod entry;
pub mod error;
pub mod goal;
pub mod identity;
pub mod month;
pub mod session;
pub mod store;

pub use error::{Error, Result};
