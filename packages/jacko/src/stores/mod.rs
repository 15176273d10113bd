//! [`IndexStore`](crate::traits::IndexStore) implementations.

mod elasticsearch;
mod memory;

pub use elasticsearch::ElasticsearchIndex;
pub use memory::MemoryIndex;
