//! corpusdb-vector
//!
//! LanceDB-backed dense index. Each corpus gets its own database directory so
//! dropping a corpus never touches another.

pub mod index;
pub mod schema;

pub use index::LanceVectorIndex;
