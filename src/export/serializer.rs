//! Artifact envelope
//!
//! A saved model is one bincode blob: magic bytes, format version, the
//! metadata record, the serialized model payload and a SHA-256 digest of
//! the payload. Any deviation is reported as [`ResaleError::MalformedArtifact`].

use crate::error::{ResaleError, Result};
use crate::model::ModelConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// File extension of saved models
pub const ARTIFACT_EXTENSION: &str = "rpm";

/// Everything stored next to a fitted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_name: String,
    pub config: ModelConfig,
    pub metrics: BTreeMap<String, f64>,
    /// RFC 3339, UTC
    pub saved_at: String,
    pub crate_version: String,
}

impl ModelMetadata {
    /// Metadata stamped with the current time
    pub fn new(config: ModelConfig, metrics: BTreeMap<String, f64>) -> Self {
        Self {
            model_name: config.model_name.clone(),
            config,
            metrics,
            saved_at: chrono::Utc::now().to_rfc3339(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArtifactEnvelope {
    magic: [u8; 4],
    format_version: u32,
    metadata: ModelMetadata,
    payload: Vec<u8>,
    checksum: String,
}

impl ArtifactEnvelope {
    const MAGIC: [u8; 4] = *b"RSPM";
    const VERSION: u32 = 1;

    fn new(metadata: ModelMetadata, payload: Vec<u8>) -> Self {
        let checksum = content_hash(&payload);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            metadata,
            payload,
            checksum,
        }
    }
}

/// Hex SHA-256 of a byte slice
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Wrap a model and its metadata into artifact bytes
pub fn encode_artifact<M: Serialize>(model: &M, metadata: ModelMetadata) -> Result<Vec<u8>> {
    let payload = bincode::serialize(model)?;
    let envelope = ArtifactEnvelope::new(metadata, payload);
    Ok(bincode::serialize(&envelope)?)
}

/// Unwrap artifact bytes, verifying magic, version and checksum
pub fn decode_artifact<M: DeserializeOwned>(bytes: &[u8]) -> Result<(M, ModelMetadata)> {
    if bytes.len() < 4 || bytes[..4] != ArtifactEnvelope::MAGIC {
        return Err(ResaleError::MalformedArtifact(
            "missing RSPM header; not a saved model".to_string(),
        ));
    }
    let envelope: ArtifactEnvelope = bincode::deserialize(bytes)
        .map_err(|e| ResaleError::MalformedArtifact(format!("unreadable envelope: {}", e)))?;

    if envelope.format_version != ArtifactEnvelope::VERSION {
        return Err(ResaleError::MalformedArtifact(format!(
            "unsupported format version {} (expected {})",
            envelope.format_version,
            ArtifactEnvelope::VERSION
        )));
    }
    if content_hash(&envelope.payload) != envelope.checksum {
        return Err(ResaleError::MalformedArtifact(
            "checksum mismatch; artifact is corrupted".to_string(),
        ));
    }

    let model = bincode::deserialize(&envelope.payload)
        .map_err(|e| ResaleError::MalformedArtifact(format!("unreadable model payload: {}", e)))?;
    Ok((model, envelope.metadata))
}

/// Write artifact bytes, creating parent directories
pub fn write_artifact(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.flush()?;
    debug!(path = %path.display(), bytes = bytes.len(), "Wrote artifact");
    Ok(())
}

/// Read artifact bytes; an absent file is [`ResaleError::ArtifactNotFound`]
pub fn read_artifact(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ResaleError::ArtifactNotFound(path.display().to_string())
        } else {
            ResaleError::IoError(e)
        }
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}
