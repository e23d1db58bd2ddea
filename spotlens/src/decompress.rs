//! Gzip decompression of chunk payloads
//!
//! Every chunk is a single gzip member holding UTF-8 CSV text. Two decoders
//! produce identical output: the streaming one from flate2, and a software
//! path that parses the member header itself, inflates the deflate body
//! with miniz_oxide and checks the CRC32 and ISIZE trailer.

use crate::{Error, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const METHOD_DEFLATE: u8 = 8;
const HEADER_LEN: usize = 10;
const TRAILER_LEN: usize = 8;

const FLAG_HCRC: u8 = 0x02;
const FLAG_EXTRA: u8 = 0x04;
const FLAG_NAME: u8 = 0x08;
const FLAG_COMMENT: u8 = 0x10;

/// Decoder used for chunk payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decompressor {
    /// flate2 `GzDecoder` over the buffered payload
    #[cfg(feature = "streaming")]
    Streaming,
    /// Hand-parsed gzip framing around a miniz_oxide inflate
    Software,
}

impl Default for Decompressor {
    fn default() -> Self {
        #[cfg(feature = "streaming")]
        {
            Decompressor::Streaming
        }
        #[cfg(not(feature = "streaming"))]
        {
            Decompressor::Software
        }
    }
}

impl Decompressor {
    /// Decompress one gzip member into text
    pub fn decompress(&self, bytes: &[u8]) -> Result<String> {
        let inflated = match self {
            #[cfg(feature = "streaming")]
            Decompressor::Streaming => streaming(bytes)?,
            Decompressor::Software => software(bytes)?,
        };
        String::from_utf8(inflated).map_err(|err| Error::Decompression(err.to_string()))
    }
}

#[cfg(feature = "streaming")]
fn streaming(bytes: &[u8]) -> Result<Vec<u8>> {
    use std::io::Read;

    let mut decoder = flate2::bufread::GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|err| Error::Decompression(err.to_string()))?;
    Ok(out)
}

fn software(bytes: &[u8]) -> Result<Vec<u8>> {
    let body_start = member_body_offset(bytes)?;
    if bytes.len() < body_start + TRAILER_LEN {
        return Err(Error::Decompression("truncated gzip member".into()));
    }
    let trailer_start = bytes.len() - TRAILER_LEN;

    let out = miniz_oxide::inflate::decompress_to_vec(&bytes[body_start..trailer_start])
        .map_err(|err| Error::Decompression(format!("inflate failed: {err:?}")))?;

    let trailer_word = |at: usize| {
        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes[at..at + 4]);
        u32::from_le_bytes(word)
    };

    let expected_crc = trailer_word(trailer_start);
    let crc = crc32fast::hash(&out);
    if expected_crc != crc {
        return Err(Error::Decompression(format!(
            "checksum mismatch: trailer says {expected_crc:08x}, inflated {crc:08x}"
        )));
    }

    // ISIZE is the uncompressed length modulo 2^32
    let expected = trailer_word(trailer_start + 4);
    if expected != out.len() as u32 {
        return Err(Error::Decompression(format!(
            "size mismatch: trailer says {expected}, inflated {}",
            out.len()
        )));
    }
    Ok(out)
}

/// Offset of the deflate stream after the member header
fn member_body_offset(bytes: &[u8]) -> Result<usize> {
    if bytes.len() < HEADER_LEN || bytes[..2] != GZIP_MAGIC {
        return Err(Error::Decompression("not a gzip member".into()));
    }
    if bytes[2] != METHOD_DEFLATE {
        return Err(Error::Decompression(format!(
            "unsupported compression method {}",
            bytes[2]
        )));
    }

    let flags = bytes[3];
    let mut offset = HEADER_LEN;

    if flags & FLAG_EXTRA != 0 {
        let len = bytes
            .get(offset..offset + 2)
            .ok_or_else(|| Error::Decompression("truncated extra field".into()))?;
        offset += 2 + u16::from_le_bytes([len[0], len[1]]) as usize;
    }
    for flag in [FLAG_NAME, FLAG_COMMENT] {
        if flags & flag != 0 {
            let terminator = bytes
                .get(offset..)
                .and_then(|rest| rest.iter().position(|&b| b == 0))
                .ok_or_else(|| Error::Decompression("unterminated header string".into()))?;
            offset += terminator + 1;
        }
    }
    if flags & FLAG_HCRC != 0 {
        offset += 2;
    }

    if offset > bytes.len() {
        return Err(Error::Decompression("truncated gzip header".into()));
    }
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::{Compression, GzBuilder};
    use std::io::Write;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_paths_agree() {
        let text = "index,value\n0,7\n3,1.5\n";
        let bytes = gzip(text);
        assert_eq!(Decompressor::Software.decompress(&bytes).unwrap(), text);
        assert_eq!(Decompressor::default().decompress(&bytes).unwrap(), text);
    }

    #[test]
    fn test_software_skips_optional_header_fields() {
        let mut encoder = GzBuilder::new()
            .filename("chunk.csv")
            .comment("feature 0")
            .extra(vec![1, 2, 3])
            .write(Vec::new(), Compression::best());
        encoder.write_all(b"x,y,value\n1,2,3\n").unwrap();
        let bytes = encoder.finish().unwrap();

        assert_eq!(
            Decompressor::Software.decompress(&bytes).unwrap(),
            "x,y,value\n1,2,3\n"
        );
    }

    #[test]
    fn test_invalid_input() {
        for decompressor in [Decompressor::default(), Decompressor::Software] {
            let err = decompressor.decompress(b"index,value\n0,7\n").unwrap_err();
            assert!(matches!(err, Error::Decompression(_)));
        }

        let mut truncated = gzip("index,value\n0,7\n");
        truncated.truncate(truncated.len() - 3);
        assert!(Decompressor::Software.decompress(&truncated).is_err());
    }

    #[test]
    fn test_corrupt_checksum_rejected_by_both_paths() {
        let mut bytes = gzip("index,value\n0,7\n");
        let crc_at = bytes.len() - TRAILER_LEN;
        bytes[crc_at] ^= 0xff;

        for decompressor in [Decompressor::default(), Decompressor::Software] {
            let err = decompressor.decompress(&bytes).unwrap_err();
            assert!(matches!(err, Error::Decompression(_)), "{decompressor:?}: {err}");
        }
    }

    #[test]
    fn test_empty_payload() {
        let bytes = gzip("");
        assert_eq!(Decompressor::Software.decompress(&bytes).unwrap(), "");
    }
}
