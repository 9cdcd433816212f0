use flate2::read::MultiGzDecoder;
use std::{borrow::Cow, io, io::Read};
use thiserror::Error;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const UTF8_BOM: char = '\u{feff}';

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("gzip decompression failed: {0}")]
    Gzip(#[source] io::Error),
    #[error("decompressed body exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Only the two leading bytes decide; nothing later in the body is sniffed.
pub fn is_gzipped(body: &[u8]) -> bool {
    body.starts_with(&GZIP_MAGIC)
}

/// Turns a fully buffered request body into text, inflating it first when it
/// carries the gzip magic number. Invalid UTF-8 sequences become U+FFFD.
pub fn decode_body(body: &[u8], max_inflated_bytes: usize) -> Result<String, DecodeError> {
    if is_gzipped(body) {
        tracing::debug!(compressed_bytes = body.len(), "detected gzip compression");
        let inflated = decompress_gzip(body, max_inflated_bytes)?;
        return Ok(into_text(&inflated));
    }

    Ok(into_text(body))
}

// Every concatenated member is inflated; bytes after a member that do not
// start another one are an error.
fn decompress_gzip(compressed: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = MultiGzDecoder::new(compressed).take(limit as u64 + 1);
    let mut inflated = Vec::new();
    decoder
        .read_to_end(&mut inflated)
        .map_err(DecodeError::Gzip)?;
    if inflated.len() > limit {
        return Err(DecodeError::TooLarge { limit });
    }
    Ok(inflated)
}

fn into_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if let Cow::Owned(_) = text {
        tracing::warn!("body contained invalid utf-8, replaced with U+FFFD");
    }
    match text.strip_prefix(UTF8_BOM) {
        Some(stripped) => stripped.to_string(),
        None => text.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    const LIMIT: usize = 1024 * 1024;

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn plain_body_passes_through() {
        let decoded = decode_body(br#"[{"key":"k1"}]"#, LIMIT).unwrap();
        assert_eq!(decoded, r#"[{"key":"k1"}]"#);
    }

    #[test]
    fn gzip_body_matches_plaintext() {
        let plain = r#"[{"key":"k1","split":"s1"}]"#;
        let compressed = gzip(plain.as_bytes());
        assert!(is_gzipped(&compressed));
        assert_eq!(decode_body(&compressed, LIMIT).unwrap(), plain);
    }

    #[test]
    fn concatenated_members_are_all_inflated() {
        let mut body = gzip(b"[1,");
        body.extend(gzip(b"2]"));
        assert_eq!(decode_body(&body, LIMIT).unwrap(), "[1,2]");
    }

    #[test]
    fn garbage_after_a_member_is_a_decode_error() {
        let mut body = gzip(b"[]");
        body.extend_from_slice(b"trailing garbage");
        assert!(matches!(decode_body(&body, LIMIT), Err(DecodeError::Gzip(_))));
    }

    #[test]
    fn magic_must_lead_the_body() {
        // Gzip content that does not start at byte zero is read as text.
        let mut body = b" ".to_vec();
        body.extend(gzip(b"[]"));
        assert!(!is_gzipped(&body));
        let decoded = decode_body(&body, LIMIT).unwrap();
        assert!(decoded.starts_with(' '));
        assert!(decoded.contains('\u{fffd}'));

        let text = "[] \u{1f}\u{8b}";
        assert_eq!(decode_body(text.as_bytes(), LIMIT).unwrap(), text);
    }

    #[test]
    fn short_bodies_are_not_gzip() {
        assert!(!is_gzipped(b""));
        assert!(!is_gzipped(&[0x1f]));
        assert_eq!(decode_body(b"", LIMIT).unwrap(), "");
    }

    #[test]
    fn truncated_gzip_is_a_decode_error() {
        let compressed = gzip(br#"[{"key":"k1"}]"#);
        // Cut into the crc/size trailer.
        let truncated = &compressed[..compressed.len() - 4];
        assert!(matches!(decode_body(truncated, LIMIT), Err(DecodeError::Gzip(_))));
        assert!(matches!(decode_body(&[0x1f, 0x8b, 0x00], LIMIT), Err(DecodeError::Gzip(_))));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let decoded = decode_body(b"[{\"key\":\"k\xff\"}]", LIMIT).unwrap();
        assert_eq!(decoded, "[{\"key\":\"k\u{fffd}\"}]");

        let decoded = decode_body(&gzip(&[0xc3, 0x28]), LIMIT).unwrap();
        assert_eq!(decoded, "\u{fffd}(");
    }

    #[test]
    fn leading_bom_is_dropped() {
        assert_eq!(decode_body("\u{feff}[]".as_bytes(), LIMIT).unwrap(), "[]");
        assert_eq!(decode_body(&gzip("\u{feff}[]".as_bytes()), LIMIT).unwrap(), "[]");
    }

    #[test]
    fn inflation_is_capped() {
        let compressed = gzip(&vec![b' '; 4096]);
        assert!(matches!(
            decode_body(&compressed, 4095),
            Err(DecodeError::TooLarge { limit: 4095 })
        ));
        assert_eq!(decode_body(&compressed, 4096).unwrap().len(), 4096);
    }
}
