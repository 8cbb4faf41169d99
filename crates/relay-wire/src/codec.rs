use std::io;

/// Compression transform applied to frame payloads on the compress
/// (client->publish) or decompress (subscribe) path of the relay loop.
///
/// Injected at mode construction time rather than selected by a compile-time
/// `#[cfg]`, so a relay process can run identity or zstd without a rebuild.
pub trait Codec: Send + Sync {
    fn compress(&self, payload: &[u8]) -> io::Result<Vec<u8>>;

    /// Attempts to decompress `payload`. Callers fall back to the raw bytes
    /// on `Err`, matching the "fall back to raw" rule in spec §4.4/§9.
    fn decompress(&self, payload: &[u8]) -> io::Result<Vec<u8>>;

    /// Cheap validity check used by the dump spooler's plain-format writer
    /// to decide whether to store the decompressed or raw bytes (spec §3,
    /// §4.1).
    fn looks_compressed(&self, payload: &[u8]) -> bool;
}

/// No-op codec: the default when compression is not configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityCodec;

impl Codec for IdentityCodec {
    fn compress(&self, payload: &[u8]) -> io::Result<Vec<u8>> {
        Ok(payload.to_vec())
    }

    fn decompress(&self, payload: &[u8]) -> io::Result<Vec<u8>> {
        Ok(payload.to_vec())
    }

    fn looks_compressed(&self, _payload: &[u8]) -> bool {
        false
    }
}

/// zstd frame codec. `looks_compressed` checks for the zstd magic number
/// (`0xFD2FB528` little-endian) rather than attempting a full decompress, so
/// it stays cheap on the spool write path.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZstdCodec {
    pub level: i32,
}

impl ZstdCodec {
    const MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Codec for ZstdCodec {
    fn compress(&self, payload: &[u8]) -> io::Result<Vec<u8>> {
        zstd::encode_all(payload, self.level)
    }

    fn decompress(&self, payload: &[u8]) -> io::Result<Vec<u8>> {
        zstd::decode_all(payload)
    }

    fn looks_compressed(&self, payload: &[u8]) -> bool {
        payload.len() >= 4 && payload[..4] == Self::MAGIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_roundtrips() {
        let c = IdentityCodec;
        let data = b"hello world".to_vec();
        assert_eq!(c.compress(&data).unwrap(), data);
        assert_eq!(c.decompress(&data).unwrap(), data);
        assert!(!c.looks_compressed(&data));
    }

    #[test]
    fn zstd_roundtrips_and_is_detected() {
        let c = ZstdCodec::new(3);
        let data = b"the quick brown fox jumps over the lazy dog".to_vec();
        let compressed = c.compress(&data).unwrap();
        assert!(c.looks_compressed(&compressed));
        assert_eq!(c.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn zstd_rejects_raw_payload() {
        let c = ZstdCodec::new(3);
        assert!(!c.looks_compressed(b"plain bytes"));
    }
}
