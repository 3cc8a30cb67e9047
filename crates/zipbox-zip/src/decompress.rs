//! Entry data decoding.

use std::io::Read;

use flate2::read::DeflateDecoder;

use crate::zip::CompressionMethod;
use crate::{Error, Result};

/// DEFLATE cannot expand input by more than this factor.
const MAX_DEFLATE_RATIO: usize = 1032;

/// Decode the stored bytes of an entry declared to hold `expected_size`
/// bytes.
///
/// Output is capped one byte past `expected_size`, so a stream that expands
/// beyond its declared size is reported without being fully inflated.
pub fn decode(
    name: &str,
    method: CompressionMethod,
    data: &[u8],
    expected_size: usize,
) -> Result<Vec<u8>> {
    let output = match method {
        CompressionMethod::Store => data.to_vec(),
        CompressionMethod::Deflate => inflate(data, expected_size)?,
    };

    if output.len() != expected_size {
        return Err(Error::SizeMismatch {
            name: name.to_string(),
            expected: expected_size as u64,
            actual: output.len() as u64,
        });
    }
    Ok(output)
}

fn inflate(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let capacity = expected_size.min(data.len().saturating_mul(MAX_DEFLATE_RATIO));
    let mut output = Vec::with_capacity(capacity);

    DeflateDecoder::new(data)
        .take((expected_size as u64).saturating_add(1))
        .read_to_end(&mut output)
        .map_err(|e| Error::Decompression(e.to_string()))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::DeflateEncoder;
    use flate2::Compression;

    use super::*;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_decode_deflate() {
        let original = b"public/index.html ".repeat(200);
        let compressed = deflate(&original);
        assert!(compressed.len() < original.len());

        let decoded = decode("a", CompressionMethod::Deflate, &compressed, original.len());
        assert_eq!(decoded.unwrap(), original);
    }

    #[test]
    fn test_decode_store_checks_size() {
        assert_eq!(
            decode("a", CompressionMethod::Store, b"hello", 5).unwrap(),
            b"hello"
        );
        assert!(matches!(
            decode("a", CompressionMethod::Store, b"hello", 4),
            Err(Error::SizeMismatch {
                expected: 4,
                actual: 5,
                ..
            })
        ));
    }

    #[test]
    fn test_deflate_output_is_capped_past_declared_size() {
        let compressed = deflate(&[0u8; 1 << 20]);

        match decode("bomb", CompressionMethod::Deflate, &compressed, 10) {
            Err(Error::SizeMismatch {
                name,
                expected,
                actual,
            }) => {
                assert_eq!(name, "bomb");
                assert_eq!(expected, 10);
                assert_eq!(actual, 11);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_deflate_short_stream_is_a_size_mismatch() {
        let compressed = deflate(b"abc");
        assert!(matches!(
            decode("a", CompressionMethod::Deflate, &compressed, 4),
            Err(Error::SizeMismatch { actual: 3, .. })
        ));
    }

    #[test]
    fn test_deflate_garbage_is_an_error() {
        let garbage = [0xFFu8; 16];
        assert!(matches!(
            decode("a", CompressionMethod::Deflate, &garbage, 16),
            Err(Error::Decompression(_))
        ));
    }
}
