//! kfsearch-vector
//!
//! Exact flat inner-product index over keyframe embeddings, its on-disk form
//! (binary vector store + JSON id→path mapping), the offline build pipeline,
//! and the text/image retrieval sources built on top of it.

pub mod flat;
pub mod index_build;
pub mod mapping;
pub mod source;
pub mod store;

pub use flat::FlatIpIndex;
pub use source::{ImageVectorSource, TextVectorSource};
