//! Core types and trait definitions for the Formwork forms backend.
//!
//! This crate holds the two subsystems every operation passes through: the
//! cascading soft-delete walk ([`cascade`] over the declarative [`graph`]) and
//! the role/permission/environment authorization model ([`authz`]). It is
//! deliberately free of database dependencies; storage backends implement
//! [`store::FormStore`] and [`cascade::CascadeTx`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod authz;
pub mod cascade;
pub mod error;
pub mod form;
pub mod graph;
pub mod id;
pub mod lifecycle;
pub mod record;
pub mod service;
pub mod store;

pub use error::{Error, Result};
