//! Persistent store for Tether.
//!
//! Pairing keys and agents live in a single SQLite file. Everything that must
//! hold under concurrent enrollment (name uniqueness, use-count exhaustion) is
//! enforced by the database itself through constraints, conditional updates
//! and a single commit transaction. See [`storage::EnrollmentStore`].

pub mod models;
pub mod storage;

pub use storage::sqlite::SqliteStorage;
