//! # SchoolSync Testkit
//!
//! Test utilities for the sync agent.
//!
//! This crate provides:
//! - The reference kiosk schema and scratch SQLite databases carrying it
//! - Seed and query helpers for the tables the merge policies touch
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use schoolsync_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_database() {
//!     let db = TestDatabase::new();
//!     let conn = db.connect();
//!     insert_student(&conn, 1, "S1", "Dana", "Levi", Some("A1"), 10);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
