//! Model persistence
//!
//! - [`serializer`]: the checksummed bincode artifact envelope
//! - [`store`]: object stores and their credentials

pub mod serializer;
pub mod store;

pub use serializer::{
    content_hash, decode_artifact, encode_artifact, read_artifact, write_artifact, ModelMetadata,
    ARTIFACT_EXTENSION,
};
pub use store::{DirectoryStore, InMemoryStore, ObjectStore, StoreCredentials};
