//! Value encoding and pluggable payload transforms.
//!
//! Values cross the engine boundary as any `Serialize` type and are stored
//! as JSON bytes. Compression and encryption are modeled as injected
//! encode/decode byte transforms; the engine never defines their internal
//! format. The defaults are identity passthroughs.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::CacheError;

type TransformFn = Arc<dyn Fn(Vec<u8>) -> Result<Vec<u8>, String> + Send + Sync>;

/// A paired encode/decode byte transform.
#[derive(Clone)]
pub struct Transform {
    encode: TransformFn,
    decode: TransformFn,
}

impl Transform {
    pub fn new<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(Vec<u8>) -> Result<Vec<u8>, String> + Send + Sync + 'static,
        D: Fn(Vec<u8>) -> Result<Vec<u8>, String> + Send + Sync + 'static,
    {
        Self {
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }

    pub fn identity() -> Self {
        Self::new(Ok, Ok)
    }

    pub fn encode(&self, bytes: Vec<u8>) -> Result<Vec<u8>, String> {
        (self.encode)(bytes)
    }

    pub fn decode(&self, bytes: Vec<u8>) -> Result<Vec<u8>, String> {
        (self.decode)(bytes)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Transforms applied to payloads on the way in and undone on the way out.
/// Applied in order compression then encryption; undone in reverse.
#[derive(Clone, Default)]
pub struct TransformPipeline {
    pub compression: Transform,
    pub encryption: Transform,
}

/// Serialize a value and run it through the enabled transforms.
pub fn encode_value<T: Serialize>(
    key: &str,
    value: &T,
    pipeline: &TransformPipeline,
    compress: bool,
    encrypt: bool,
) -> Result<Vec<u8>, CacheError> {
    let mut bytes = serde_json::to_vec(value).map_err(|e| CacheError::Serialization {
        key: key.to_string(),
        detail: e.to_string(),
    })?;
    if compress {
        bytes = pipeline
            .compression
            .encode(bytes)
            .map_err(|detail| CacheError::Serialization {
                key: key.to_string(),
                detail,
            })?;
    }
    if encrypt {
        bytes = pipeline
            .encryption
            .encode(bytes)
            .map_err(|detail| CacheError::Serialization {
                key: key.to_string(),
                detail,
            })?;
    }
    Ok(bytes)
}

/// Undo transforms and deserialize back into the caller's type.
pub fn decode_value<T: DeserializeOwned>(
    key: &str,
    mut bytes: Vec<u8>,
    pipeline: &TransformPipeline,
    compressed: bool,
    encrypted: bool,
) -> Result<T, CacheError> {
    if encrypted {
        bytes = pipeline
            .encryption
            .decode(bytes)
            .map_err(|detail| CacheError::Serialization {
                key: key.to_string(),
                detail,
            })?;
    }
    if compressed {
        bytes = pipeline
            .compression
            .decode(bytes)
            .map_err(|detail| CacheError::Serialization {
                key: key.to_string(),
                detail,
            })?;
    }
    serde_json::from_slice(&bytes).map_err(|e| CacheError::Serialization {
        key: key.to_string(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trip() {
        let pipeline = TransformPipeline::default();
        let bytes = encode_value("k", &vec![1u32, 2, 3], &pipeline, true, true).unwrap();
        let back: Vec<u32> = decode_value("k", bytes, &pipeline, true, true).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn custom_transform_is_applied_and_undone() {
        let xor = |bytes: Vec<u8>| Ok(bytes.into_iter().map(|b| b ^ 0x5a).collect());
        let pipeline = TransformPipeline {
            compression: Transform::identity(),
            encryption: Transform::new(xor, xor),
        };
        let plain = serde_json::to_vec("secret").unwrap();
        let bytes = encode_value("k", &"secret", &pipeline, false, true).unwrap();
        assert_ne!(bytes, plain);
        let back: String = decode_value("k", bytes, &pipeline, false, true).unwrap();
        assert_eq!(back, "secret");
    }

    #[test]
    fn failing_transform_surfaces_as_serialization_error() {
        let pipeline = TransformPipeline {
            compression: Transform::new(|_| Err("boom".to_string()), Ok),
            encryption: Transform::identity(),
        };
        let err = encode_value("k", &1u8, &pipeline, true, false).unwrap_err();
        assert_eq!(err.kind(), "serialization");
    }
}
