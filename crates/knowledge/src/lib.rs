//! Knowledge storage and ingestion for SecondBrain.
//!
//! Backends:
//! - [`SqliteKnowledgeStore`]: SQLite with an FTS5 index over processed content
//! - [`InMemoryKnowledgeStore`]: a Vec behind a lock, for tests and ephemeral runs
//!
//! [`Ingestor`] records new items and normalizes them in the background.

pub mod in_memory;
pub mod ingest;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryKnowledgeStore;
pub use ingest::{ContentProcessor, IngestError, IngestLimits, IngestRequest, Ingestor, Submitted};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteKnowledgeStore;
