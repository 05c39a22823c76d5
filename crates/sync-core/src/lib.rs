//! Core types for the decentraland-tap framework.
//!
//! This crate provides the foundational types shared by every stream:
//!
//! - [`IncrementalStream`] - The contract a paginated, resumable stream implements
//! - [`StreamDescriptor`] - Name, keys and replication settings of a stream
//! - [`StreamSchema`] - Static field-to-type mapping of the emitted records
//! - [`SortednessGuard`] - Enforces the declared sortedness of a stream
//! - [`SyncError`] - Classified errors raised by the pagination core
//! - [`Message`] - The SCHEMA / RECORD / STATE messages written to the output
//!
//! # Architecture
//!
//! ```text
//! checkpoint
//!    │
//! sync-core (this crate)
//!    │
//!    ├─── decentraland-poaps-source  (implements IncrementalStream twice)
//!    │
//!    └─── decentraland-tap           (runs streams, writes messages)
//! ```

pub mod error;
pub mod message;
pub mod schema;
pub mod sorted;
pub mod stream;
pub mod types;

// Re-exports for convenience
pub use error::SyncError;
pub use message::Message;
pub use schema::{FieldSchema, SchemaError, StreamSchema};
pub use sorted::SortednessGuard;
pub use stream::{IncrementalStream, ReplicationMethod, StreamDescriptor};
pub use types::FieldType;
