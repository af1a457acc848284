//! Persistence for pipeline state and extracted records.
//!
//! - `state`: SQLite store of discovered URLs, outcomes and the processing log
//! - `local`: JSON output sink on the local filesystem
//!
//! ## Output Layout
//!
//! ```text
//! {output}/
//! └── eng/
//!     └── 198504/
//!         └── Title (Author).json
//! ```

pub mod local;
pub mod state;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::DocumentRecord;

// Re-export for convenience
pub use local::LocalStorage;
pub use state::{DocumentRow, FailureCount, LogEntry, LogStatus, StateStore, ops};

/// Destination for assembled records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist one record and return where it was written.
    async fn write_record(&self, record: &DocumentRecord) -> Result<PathBuf>;
}
