//! Gzip decompression for `Multi` envelopes.

use crate::config::MAX_PAYLOAD_SIZE;
use crate::error::{ProtocolError, Result};
use flate2::read::GzDecoder;
use std::io::Read;

/// Maximum output size for decompression (aligned with the frame cap to
/// prevent decompression bombs).
const MAX_DECOMPRESSION_SIZE: usize = MAX_PAYLOAD_SIZE;

/// Decompress a gzip stream, enforcing the output size limit.
///
/// # Errors
/// Returns `DecompressionFailure` on malformed input or when the output
/// exceeds `MAX_DECOMPRESSION_SIZE`.
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = GzDecoder::new(data);
    let mut out = Vec::new();
    let mut buffer = [0u8; 8192];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                out.extend_from_slice(&buffer[..n]);
                if out.len() > MAX_DECOMPRESSION_SIZE {
                    return Err(ProtocolError::DecompressionFailure);
                }
            }
            Err(_) => return Err(ProtocolError::DecompressionFailure),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let original = b"a stream of size and data pairs, repeated a few times";
        assert_eq!(gunzip(&gzip(original)).unwrap(), original);
    }

    #[test]
    fn test_empty_roundtrip() {
        assert_eq!(gunzip(&gzip(b"")).unwrap(), b"");
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(gunzip(&[0xDE, 0xAD, 0xBE, 0xEF]).is_err());
    }

    #[test]
    fn test_truncated_stream_rejected() {
        let mut compressed = gzip(&vec![7u8; 4096]);
        compressed.truncate(compressed.len() / 2);
        assert!(gunzip(&compressed).is_err());
    }
}
