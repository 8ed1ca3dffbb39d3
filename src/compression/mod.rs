//! Compression Module
//!
//! Size- and type-aware response compression. The manager never advertises
//! an encoding it did not apply: if the compressed form is not strictly
//! smaller, the original bytes go out as `identity`.

mod stats;

use std::fmt;
use std::io::{Read, Write};

use flate2::{
    read::{DeflateDecoder, GzDecoder},
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::health::ComponentHealth;

pub use stats::CompressionStats;
use stats::CompressionCounters;

/// Default `decide` threshold in bytes.
pub const DEFAULT_MIN_SIZE: usize = 1024;

/// Structured-text media types eligible for compression.
const COMPRESSIBLE_TYPES: &[&str] = &[
    "application/json",
    "application/javascript",
    "application/xml",
    "text/html",
    "text/css",
    "text/javascript",
    "text/xml",
    "text/plain",
];

// == Encoding ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Gzip,
    Deflate,
    Identity,
}

impl Encoding {
    /// Token used in `Content-Encoding` / `Accept-Encoding`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Gzip => "gzip",
            Encoding::Deflate => "deflate",
            Encoding::Identity => "identity",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => Some(Encoding::Gzip),
            "deflate" => Some(Encoding::Deflate),
            "identity" => Some(Encoding::Identity),
            _ => None,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Config ==
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Payloads shorter than this are never compressed
    pub min_size: usize,
    /// Encoder level, 0-9
    pub level: u32,
    /// Algorithm used when the client does not constrain the choice
    pub algorithm: Encoding,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            level: 6,
            algorithm: Encoding::Gzip,
        }
    }
}

/// Pure outcome of [`CompressionManager::decide`]; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionDecision {
    pub should_compress: bool,
    pub algorithm: Encoding,
}

/// Bytes to transmit plus the encoding actually applied to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedPayload {
    pub bytes: Vec<u8>,
    pub encoding: Encoding,
}

impl CompressedPayload {
    pub fn is_compressed(&self) -> bool {
        self.encoding != Encoding::Identity
    }
}

// == Compression Manager ==
#[derive(Debug, Default)]
pub struct CompressionManager {
    config: CompressionConfig,
    counters: CompressionCounters,
}

impl CompressionManager {
    pub fn new(config: CompressionConfig) -> Self {
        let mut config = config;
        config.level = config.level.min(9);
        if config.algorithm == Encoding::Identity {
            config.algorithm = Encoding::Gzip;
        }
        Self {
            config,
            counters: CompressionCounters::default(),
        }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    // == Decide ==
    /// Decides whether `payload` of `content_type` is worth compressing.
    pub fn decide(&self, payload: &[u8], content_type: &str) -> CompressionDecision {
        let should_compress =
            payload.len() >= self.config.min_size && is_compressible(content_type);

        if !should_compress {
            self.counters.record_skip();
        }

        CompressionDecision {
            should_compress,
            algorithm: if should_compress {
                self.config.algorithm
            } else {
                Encoding::Identity
            },
        }
    }

    // == Compress ==
    /// Compresses with the configured algorithm.
    pub fn compress(&self, payload: &[u8]) -> CompressedPayload {
        self.compress_with(payload, self.config.algorithm)
    }

    /// Compresses with `algorithm`, falling back to identity when the result
    /// is not strictly smaller or the encoder fails.
    pub fn compress_with(&self, payload: &[u8], algorithm: Encoding) -> CompressedPayload {
        let encoded = match algorithm {
            Encoding::Identity => None,
            _ => match encode(payload, algorithm, self.config.level) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("{} compression failed, sending identity: {}", algorithm, e);
                    self.counters.record_failure();
                    None
                }
            },
        };

        match encoded {
            Some(bytes) if bytes.len() < payload.len() => {
                debug!(
                    "Compressed {} -> {} bytes with {}",
                    payload.len(),
                    bytes.len(),
                    algorithm
                );
                self.counters
                    .record_outcome(payload.len(), bytes.len(), true);
                CompressedPayload {
                    bytes,
                    encoding: algorithm,
                }
            }
            _ => {
                self.counters
                    .record_outcome(payload.len(), payload.len(), false);
                CompressedPayload {
                    bytes: payload.to_vec(),
                    encoding: Encoding::Identity,
                }
            }
        }
    }

    // == Decompress ==
    pub fn decompress(&self, bytes: &[u8], encoding: Encoding) -> Result<Vec<u8>> {
        decode(bytes, encoding)
    }

    // == Negotiate ==
    /// Picks the encoding to use for a request's `Accept-Encoding` header.
    ///
    /// Returns `None` when the client accepts no supported compression.
    pub fn negotiate(&self, accept_encoding: Option<&str>) -> Option<Encoding> {
        let header = accept_encoding?;
        let mut best: Option<(Encoding, f32)> = None;

        for item in header.split(',') {
            let mut parts = item.split(';');
            let token = parts.next().unwrap_or("").trim();
            let quality = parts
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            if quality <= 0.0 {
                continue;
            }

            let encoding = if token == "*" {
                self.config.algorithm
            } else {
                match Encoding::from_token(token) {
                    Some(Encoding::Identity) | None => continue,
                    Some(encoding) => encoding,
                }
            };

            let better = match best {
                None => true,
                Some((current, q)) => {
                    quality > q || (quality == q && encoding == self.config.algorithm && current != encoding)
                }
            };
            if better {
                best = Some((encoding, quality));
            }
        }

        best.map(|(encoding, _)| encoding)
    }

    pub fn metrics(&self) -> CompressionStats {
        self.counters.snapshot()
    }

    /// Compresses a fixed probe and checks it round-trips.
    pub fn health_check(&self) -> ComponentHealth {
        let probe = vec![b'a'; self.config.min_size.max(64)];
        let packed = self.compress(&probe);
        match self.decompress(&packed.bytes, packed.encoding) {
            Ok(restored) if restored == probe => ComponentHealth::healthy(format!(
                "{} level {} round-trip ok",
                self.config.algorithm, self.config.level
            )),
            Ok(_) => ComponentHealth::unhealthy("round-trip produced different bytes"),
            Err(e) => ComponentHealth::unhealthy(e.to_string()),
        }
    }
}

/// True when `content_type` (parameters ignored) is structured text.
pub fn is_compressible(content_type: &str) -> bool {
    let media = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    COMPRESSIBLE_TYPES.contains(&media.as_str())
        || media.ends_with("+json")
        || media.ends_with("+xml")
}

fn encode(payload: &[u8], algorithm: Encoding, level: u32) -> std::io::Result<Vec<u8>> {
    let level = Compression::new(level);
    match algorithm {
        Encoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), level);
            encoder.write_all(payload)?;
            encoder.finish()
        }
        Encoding::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), level);
            encoder.write_all(payload)?;
            encoder.finish()
        }
        Encoding::Identity => Ok(payload.to_vec()),
    }
}

fn decode(bytes: &[u8], encoding: Encoding) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let read = match encoding {
        Encoding::Gzip => GzDecoder::new(bytes).read_to_end(&mut out),
        Encoding::Deflate => DeflateDecoder::new(bytes).read_to_end(&mut out),
        Encoding::Identity => return Ok(bytes.to_vec()),
    };
    read.map_err(|e| CacheError::Compression(format!("{} decode failed: {}", encoding, e)))?;
    Ok(out)
}
