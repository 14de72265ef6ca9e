pub mod export;
pub mod index;
pub mod matrix;
pub mod retrieve;

pub use index::{IndexBuilder, IndexDoc, IndexMeta, IndexPaths, ItemMeta};
pub use matrix::VectorMatrix;
pub use retrieve::{Retriever, SearchHit};
