use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{RemoteError, RemoteResult};

/// Encode raw bytes for the contents API
pub fn encode_content(content: &[u8]) -> String {
    STANDARD.encode(content)
}

/// Decode contents API payload back to bytes.
/// GitHub wraps base64 at 60 columns, so ASCII whitespace is skipped.
pub fn decode_content(encoded: &str) -> RemoteResult<Vec<u8>> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| RemoteError::Decode(format!("invalid base64 content: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_wrapped_content() {
        // "{\n  \"count\": 4\n}" split across lines as GitHub returns it
        let wrapped = "ewogICJjb3Vu\ndCI6IDQKfQ==\n";
        let decoded = decode_content(wrapped).unwrap();
        assert_eq!(decoded, b"{\n  \"count\": 4\n}");
    }

    #[test]
    fn test_encode_binary() {
        assert_eq!(encode_content(&[0xff, 0x00, 0x10]), "/wAQ");
        assert_eq!(encode_content(b""), "");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_content("not*base64").unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)));
    }
}
