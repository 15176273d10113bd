//! Seams between the pipeline and the systems it talks to.

pub mod enricher;
pub mod source;
pub mod store;

pub use enricher::Enricher;
pub use source::HistorySource;
pub use store::{IndexDocument, IndexStore};
