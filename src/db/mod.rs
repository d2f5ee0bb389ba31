//! Database module: models, schema and the store implementations.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `store.rs`: capability traits the services depend on
//! - `sqlite.rs` / `memory.rs`: persistent and in-process implementations

pub mod memory;
pub mod models;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use memory::MemoryStore;
pub use models::{Course, CourseId, Lesson, Role, User, UserId};
pub use schema::SQLITE_INIT;
pub use sqlite::{SqlitePool, SqliteStore};
pub use store::{CourseRepository, EnrollmentLedger, SessionRepository, Store, UserRepository};
