//! kfsearch-hybrid
//!
//! Query-time engine: the model registry, the orchestrator that fans a
//! request out to every retrieval source, Reciprocal Rank Fusion, and the
//! response shape handed back to callers.

pub mod fusion;
pub mod orchestrator;
pub mod registry;
pub mod response;

pub use fusion::fuse;
pub use orchestrator::{QueryOrchestrator, RankedResults, SearchOutcome, SearchRequest};
pub use registry::{LoadedModel, ModelRegistry, Snapshot};
pub use response::{SearchInfo, SearchResponse};
