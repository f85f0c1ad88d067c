#![doc = include_str!("../../../README.md")]
//!

//! This crate re-exports the client core: the backend gateway, the
//! session/file store and the upload controller.

pub use csvdash_core::*;
