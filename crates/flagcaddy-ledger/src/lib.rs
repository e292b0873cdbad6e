//! Durable storage for flagcaddy sessions, events, facts, and recommendations.
//!
//! [`RecordStore`] is the contract the recommendation engine consumes;
//! [`SqliteStore`] is the SQLite implementation used by the CLI.

mod events;
mod facts;
pub(crate) mod parse_helpers;
mod recommendations;
pub mod record_store;
mod session;
pub mod store;

pub use record_store::RecordStore;
pub use store::SqliteStore;
