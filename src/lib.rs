//! Core library for the `runboard` console.
//!
//! This crate provides the engine behind the operator console for a
//! distributed load-testing controller: the one-shot api layer, the
//! authenticated auto-reconnecting live channel, the normalized entity
//! store with its derived views, and the test-run composer. The
//! primary user-facing interface is the `runboard` binary; a richer
//! presentation layer can embed [`service::ConsoleService`] directly.
pub mod api;
pub mod args;
pub mod channel;
pub mod compose;
pub mod config;
pub mod entry;
pub mod error;
pub mod logger;
pub mod model;
pub mod notify;
pub mod service;
pub mod store;
