//! # secil-base
//!
//! Structural atoms for the secil compiler.
//!
//! This crate provides the foundational types used throughout secil:
//!
//! - [`Location`] — source line tracking for diagnostics
//! - [`CompileError`]/[`ErrorKind`]/[`Result`] — the closed error model
//! - [`Bitmap`] — dense boolean vectors over compact integer ids
//!
//! # Design Principles
//!
//! This crate has **no knowledge of CIL syntax or the policy database**. It
//! provides only generic, reusable infrastructure that the tree, resolver,
//! and lowering crates build upon.

pub mod bitmap;
pub mod error;
pub mod location;

pub use bitmap::Bitmap;
pub use error::{CompileError, ErrorKind, Result};
pub use location::Location;
