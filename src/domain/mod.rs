pub mod collection;
pub mod embedder;
pub mod entry;
