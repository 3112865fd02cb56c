//! End-to-end tests for the secil compilation pipeline.
//!
//! The scenarios live under `tests/`; the shared tree-building helpers
//! are in `tests/common/mod.rs`. This library target is intentionally
//! empty.
