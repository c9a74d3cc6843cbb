//! Tile codecs.
//!
//! A codec turns a [`RasterBuffer`] into tile bytes and back. Each pyramid
//! records the format name its tiles were written with, and readers look
//! the codec up in an explicit [`CodecRegistry`].

use bytes::Bytes;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;

use crate::error::{CoverageError, Result};
use crate::raster::RasterBuffer;

/// Width, height and band count, each a little-endian `u32`.
const HEADER_LEN: usize = 12;

/// Encode/decode collaborator for tile payloads.
pub trait RasterCodec: Send + Sync {
    /// Format name stored in pyramid descriptors.
    fn format(&self) -> &str;

    fn encode(&self, raster: &RasterBuffer) -> Result<Bytes>;

    fn decode(&self, data: &[u8]) -> Result<RasterBuffer>;
}

/// Uncompressed tiles: a 12-byte shape header followed by little-endian
/// `f32` samples, pixel-interleaved.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl RawCodec {
    pub const FORMAT: &'static str = "raw";
}

impl RasterCodec for RawCodec {
    fn format(&self) -> &str {
        Self::FORMAT
    }

    fn encode(&self, raster: &RasterBuffer) -> Result<Bytes> {
        Ok(Bytes::from(encode_raw(raster)?))
    }

    fn decode(&self, data: &[u8]) -> Result<RasterBuffer> {
        decode_raw(data)
    }
}

/// The raw payload compressed with zlib.
#[derive(Debug, Clone, Copy)]
pub struct DeflateCodec {
    level: Compression,
}

impl DeflateCodec {
    pub const FORMAT: &'static str = "deflate";

    /// Compression level 0-9.
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self {
            level: Compression::fast(),
        }
    }
}

impl RasterCodec for DeflateCodec {
    fn format(&self) -> &str {
        Self::FORMAT
    }

    fn encode(&self, raster: &RasterBuffer) -> Result<Bytes> {
        let raw = encode_raw(raster)?;
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), self.level);
        encoder
            .write_all(&raw)
            .map_err(|e| CoverageError::codec(format!("deflate: {}", e)))?;
        let compressed = encoder
            .finish()
            .map_err(|e| CoverageError::codec(format!("deflate: {}", e)))?;
        Ok(Bytes::from(compressed))
    }

    fn decode(&self, data: &[u8]) -> Result<RasterBuffer> {
        let mut decoder = ZlibDecoder::new(data);
        let mut raw = Vec::new();
        decoder
            .read_to_end(&mut raw)
            .map_err(|e| CoverageError::codec(format!("inflate: {}", e)))?;
        decode_raw(&raw)
    }
}

fn encode_raw(raster: &RasterBuffer) -> Result<Vec<u8>> {
    let dims = [raster.width(), raster.height(), raster.bands()];
    let mut out = Vec::with_capacity(HEADER_LEN + raster.data().len() * 4);
    for dim in dims {
        let dim = u32::try_from(dim)
            .map_err(|_| CoverageError::codec(format!("raster dimension {} too large", dim)))?;
        out.extend_from_slice(&dim.to_le_bytes());
    }
    for value in raster.data() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    Ok(out)
}

fn decode_raw(data: &[u8]) -> Result<RasterBuffer> {
    if data.len() < HEADER_LEN {
        return Err(CoverageError::codec(format!(
            "tile payload of {} bytes is shorter than its header",
            data.len()
        )));
    }
    let (header, body) = data.split_at(HEADER_LEN);
    let mut dims = header
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as usize);
    let (width, height, bands) = match (dims.next(), dims.next(), dims.next()) {
        (Some(w), Some(h), Some(b)) => (w, h, b),
        _ => return Err(CoverageError::codec("truncated tile header")),
    };

    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(bands))
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| CoverageError::codec("tile shape overflows"))?;
    if body.len() != expected {
        return Err(CoverageError::codec(format!(
            "{}x{}x{} tile needs {} bytes of samples, got {}",
            width,
            height,
            bands,
            expected,
            body.len()
        )));
    }

    let samples = body
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    RasterBuffer::new(width, height, bands, samples).map_err(|e| CoverageError::codec(e.to_string()))
}

/// Codecs by format name.
///
/// Built explicitly and handed to the resource; there is no global
/// registry.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: BTreeMap<String, Arc<dyn RasterCodec>>,
}

impl CodecRegistry {
    /// A registry with no codecs.
    pub fn empty() -> Self {
        Self {
            codecs: BTreeMap::new(),
        }
    }

    /// A registry holding the built-in `raw` and `deflate` codecs.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(RawCodec));
        registry.register(Arc::new(DeflateCodec::default()));
        registry
    }

    /// Add a codec, replacing any codec with the same format name.
    pub fn register(&mut self, codec: Arc<dyn RasterCodec>) {
        self.codecs.insert(codec.format().to_string(), codec);
    }

    pub fn get(&self, format: &str) -> Result<Arc<dyn RasterCodec>> {
        self.codecs
            .get(format)
            .cloned()
            .ok_or_else(|| CoverageError::codec(format!("no codec registered for '{}'", format)))
    }

    pub fn contains(&self, format: &str) -> bool {
        self.codecs.contains_key(format)
    }

    pub fn formats(&self) -> Vec<&str> {
        self.codecs.keys().map(String::as_str).collect()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}
