//! Pipeline entry points for harvester operations.
//!
//! - `run_discover`: Find conference URLs from index and archive pages
//! - `run_enumerate`: List talk URLs for pending conferences
//! - `run_extract`: Extract pending talks through the batch coordinator
//! - `run_pipeline`: All three stages in order
//! - `run_validate`: Strict configuration check

pub mod batch;
pub mod context;
pub mod discover;
pub mod enumerate;
pub mod extract;
pub mod load;
#[allow(clippy::module_inception)]
pub mod pipeline;
pub mod validate;

pub use batch::BatchCoordinator;
pub use context::PipelineContext;
pub use discover::run_discover;
pub use enumerate::run_enumerate;
pub use extract::{ExtractOptions, run_extract};
pub use load::{LoadProbe, LoadSample, ProcLoadProbe};
pub use pipeline::run_pipeline;
pub use validate::run_validate;
