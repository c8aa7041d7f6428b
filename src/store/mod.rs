//! Durable storage for downloaded artifacts.
//!
//! Two stores back the pipeline's commit step:
//! - [`ContentStore`] - filesystem directory holding one `.png` per
//!   artifact key
//! - [`MetadataStore`] - SQLite provenance table with insert-or-ignore
//!   write semantics
//!
//! Both are cheap to clone and safe to share between concurrent batch
//! workers.

mod content;
mod metadata;

pub use content::{ContentStore, StoreError};
pub use metadata::{MetadataError, MetadataStore, SkinRow};
