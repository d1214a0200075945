// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! URL-safe wrappers for encoded VFS paths
//!
//! Both variants percent-encode every character of every `/` delimited
//! segment while leaving the `/` delimiters themselves literal, so routers
//! and reverse proxies still see the path structure.
//!
//! The router variant additionally rewrites `%` to `-` (and a literal `-`
//! to `-2D`) because some client-side routers decode `%` sequences in route
//! parameters on their own and corrupt the value.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;

/// Same set `encodeURIComponent` escapes.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlPathError {
    #[error("Decoded URL path is not valid UTF-8: {0}")]
    InvalidUtf8(String),
}

/// Percent-encode each segment of `path`, keeping `/` as the delimiter.
pub fn encode_url_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Inverse of [`encode_url_path`].
pub fn decode_url_path(path: &str) -> Result<String, UrlPathError> {
    percent_decode_str(path)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| UrlPathError::InvalidUtf8(path.to_string()))
}

/// Router-safe encoding: like [`encode_url_path`] but with no `%` in the
/// output.
pub fn encode_path_in_url(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            utf8_percent_encode(segment, SEGMENT)
                .to_string()
                .replace('-', "%2D")
                .replace('%', "-")
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Inverse of [`encode_path_in_url`].
pub fn decode_path_in_url(path: &str) -> Result<String, UrlPathError> {
    decode_url_path(&path.replace('-', "%"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_keeps_slashes() {
        assert_eq!(
            encode_url_path("/vfs/a b/c?d#e"),
            "/vfs/a%20b/c%3Fd%23e"
        );
    }

    #[test]
    fn test_encode_unreserved_untouched() {
        assert_eq!(encode_url_path("A-z_0.9!~*'()"), "A-z_0.9!~*'()");
    }

    #[test]
    fn test_encode_non_ascii() {
        assert_eq!(encode_url_path("é"), "%C3%A9");
        assert_eq!(decode_url_path("%C3%A9").unwrap(), "é");
    }

    #[test]
    fn test_decode_invalid_utf8() {
        assert!(matches!(
            decode_url_path("%FF%FE"),
            Err(UrlPathError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_router_variant_has_no_percent() {
        let encoded = encode_path_in_url("/file/C:/my-dir/a b");
        assert_eq!(encoded, "/file/C-3A/my-2Ddir/a-20b");
        assert!(!encoded.contains('%'));
        assert_eq!(decode_path_in_url(&encoded).unwrap(), "/file/C:/my-dir/a b");
    }

    #[test]
    fn test_round_trip_both_variants() {
        for s in ["plain", "a b", "50%", "-", "--x--", "\"quoted\"", "ümlaut ☃", "a\\b", "?#&="] {
            assert_eq!(decode_url_path(&encode_url_path(s)).unwrap(), s);
            assert_eq!(decode_path_in_url(&encode_path_in_url(s)).unwrap(), s);
            assert!(!encode_url_path(s).contains('/'));
            assert!(!encode_path_in_url(s).contains('/'));
        }
    }
}
