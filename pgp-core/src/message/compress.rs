//! Compression/decompression for Compressed Data packets (RFC 4880
//! §5.6): zlib, zip (raw deflate), and bzip2.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::types::CompressionAlgorithm;

/// Compresses `data` with `algo`. `CompressionAlgorithm::Uncompressed`
/// is a no-op copy, matching a Compressed Data packet whose algorithm
/// octet is 0 (rare, but not forbidden by RFC 4880).
pub fn compress(algo: CompressionAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
    match algo {
        CompressionAlgorithm::Uncompressed => Ok(data.to_vec()),
        #[cfg(feature = "compression-deflate")]
        CompressionAlgorithm::Zlib => {
            let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            encoder.finish().map_err(|e| anyhow::Error::new(Error::Io(e)))
        }
        #[cfg(feature = "compression-deflate")]
        CompressionAlgorithm::Zip => {
            let mut encoder = flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            encoder.finish().map_err(|e| anyhow::Error::new(Error::Io(e)))
        }
        #[cfg(feature = "compression-bzip2")]
        CompressionAlgorithm::BZip2 => {
            let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            encoder.write_all(data).map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            encoder.finish().map_err(|e| anyhow::Error::new(Error::Io(e)))
        }
        other => Err(anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
            "compression algorithm {other}"
        )))),
    }
}

/// Decompresses `data` compressed with `algo`.
pub fn decompress(algo: CompressionAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
    match algo {
        CompressionAlgorithm::Uncompressed => Ok(data.to_vec()),
        #[cfg(feature = "compression-deflate")]
        CompressionAlgorithm::Zlib => {
            let mut out = Vec::new();
            flate2::read::ZlibDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            Ok(out)
        }
        #[cfg(feature = "compression-deflate")]
        CompressionAlgorithm::Zip => {
            let mut out = Vec::new();
            flate2::read::DeflateDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            Ok(out)
        }
        #[cfg(feature = "compression-bzip2")]
        CompressionAlgorithm::BZip2 => {
            let mut out = Vec::new();
            bzip2::read::BzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| anyhow::Error::new(Error::Io(e)))?;
            Ok(out)
        }
        other => Err(anyhow::Error::new(Error::UnsupportedAlgorithm(format!(
            "compression algorithm {other}"
        )))),
    }
}

#[cfg(all(test, feature = "compression-deflate"))]
mod tests {
    use super::*;

    #[test]
    fn zlib_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog, repeatedly, a lot";
        let compressed = compress(CompressionAlgorithm::Zlib, data).unwrap();
        let decompressed = decompress(CompressionAlgorithm::Zlib, &compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn uncompressed_is_identity() {
        let data = b"plain";
        assert_eq!(compress(CompressionAlgorithm::Uncompressed, data).unwrap(), data);
    }
}
