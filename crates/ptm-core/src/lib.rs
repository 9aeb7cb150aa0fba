//! PTM Core - harvests pre-trained model metadata into a relational store.
//!
//! Raw rows flow one way through the pipeline:
//!
//! 1. a [`HubSource`] extracts hub-native rows (HuggingFace, PyTorch Hub)
//! 2. the field mapper turns each into an ordered canonical row
//! 3. the normalizer filters tags against the hub's controlled vocabulary
//! 4. the relational loader upserts lookup values and writes the model
//! 5. the query layer reads one model back through its join tables
//!
//! # Example
//!
//! ```rust,ignore
//! use ptm_core::{harvest, HarvestOptions, HuggingFaceSource, MetadataStore, ModelHub};
//!
//! #[tokio::main]
//! async fn main() -> ptm_core::Result<()> {
//!     let store = MetadataStore::open("ptm.db")?;
//!     let source = HuggingFaceSource::models(None)?;
//!     let mut options = HarvestOptions::new(ModelHub::HuggingFace);
//!     options.limit = Some(100);
//!
//!     let report = harvest(&source, &store, &options).await?;
//!     println!("Loaded {} models", report.load.map_or(0, |l| l.loaded()));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod hubs;
pub mod mapping;
pub mod network;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod store;
pub mod validate;

pub use config::{HarvestConfig, HarvestOptions, HubConfig, ModelHub, NetworkConfig};
pub use error::{PtmError, Result};
pub use export::{export_table, Table};
pub use hubs::{source_for, HubSource, HuggingFaceSource, PyTorchSource};
pub use mapping::{map_batch, FieldMapping, FieldSource, MapContext, SideTable, SideTables};
pub use normalize::{normalize_tags, TagVocabulary, VocabularyNamespace};
pub use pipeline::{harvest, HarvestReport};
pub use record::{Discussion, DiscussionEvent, MappedRow, ModelRecord, RawRecord, RowFailure};
pub use store::{LoadReport, LookupTable, MetadataStore, ModelInfoRow, ModelView};
pub use validate::{validate, Constraint, Problem, ValueKind};
