//! rust-pbipgen: A fast Rust generator for Power BI Projects
//!
//! This library generates the TMDL semantic-model definition of a PBIP
//! project from a declarative description of Dataverse tables, columns and
//! relationships, and updates it incrementally while preserving user-authored
//! measures, descriptions and relationships.

pub mod diff;
pub mod emit;
pub mod error;
pub mod merge;
pub mod model;
pub mod orchestrator;
pub mod parse;
pub mod progress;
pub mod template;
pub mod util;

pub use diff::{ChangeEntry, ChangeKind, ChangeSet, Impact};
pub use error::PbipGenError;
pub use model::BuildRequest;
pub use orchestrator::{build, BuildMode, BuildOutcome};
pub use progress::{CancelToken, NullSink, ProgressSink, TracingSink};
