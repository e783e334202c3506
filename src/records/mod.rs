//! Persistent download records.
//!
//! One YAML file per (repository, filename, destination) triple, named by a
//! name-based UUID derived from the triple. The record remembers which release
//! tag was last downloaded so repeated runs can skip assets that are current.

pub mod error;
pub mod store;
pub mod types;

pub use error::RecordError;
pub use store::{identifier_for, RecordStore, YamlRecordStore};
pub use types::Record;
