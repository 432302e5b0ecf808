//! Memory artifact encoding and retrieval for FieldRAG.
//!
//! - [`KnowledgeBase`]: the directory of `*.txt` source documents
//! - [`MemoryEncoder`]: chunk, embed, and persist documents as an artifact pair
//! - [`FileSession`]: similarity search over one persisted artifact

pub mod artifact;
pub mod chunker;
pub mod embedding;
pub mod encoder;
pub mod knowledge_base;
pub mod session;
pub mod vector;

pub use artifact::{IndexDescriptor, IndexEntry, MemoryPayload, StoredChunk};
pub use chunker::{TextChunk, TextChunker};
pub use embedding::{Embedder, HashingEmbedder};
pub use encoder::{EncodeReport, MemoryEncoder};
pub use knowledge_base::KnowledgeBase;
pub use session::{FileSession, FileSessionOpener};
pub use vector::{cosine_similarity, rank_by_similarity};
