//! Path validation and normalization (§4.4).
//!
//! Normalization is applied identically on the store side (`add`/`remove`)
//! and the lookup side (`try_get`) so that `/chat` and `/chat/` always
//! resolve to the same host.

use percent_encoding::percent_decode_str;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    #[error("path must not be empty")]
    Empty,
    #[error("path must begin with '/'")]
    NotAbsolute,
    #[error("path must not contain '?' or '#'")]
    HasQueryOrFragment,
}

/// Validates the raw path per the grammar in §6: non-empty, absolute,
/// containing neither `?` nor `#`.
pub fn validate(raw: &str) -> Result<(), PathError> {
    if raw.is_empty() {
        return Err(PathError::Empty);
    }
    if !raw.starts_with('/') {
        return Err(PathError::NotAbsolute);
    }
    if raw.contains('?') || raw.contains('#') {
        return Err(PathError::HasQueryOrFragment);
    }
    Ok(())
}

/// URL-decodes `raw`, then trims a single trailing `/` unless that would
/// leave an empty string, in which case the result is `"/"`.
///
/// Idempotent: `normalize(normalize(p)) == normalize(p)`.
pub fn normalize(raw: &str) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    if decoded == "/" || !decoded.ends_with('/') {
        return decoded.into_owned();
    }
    let trimmed = decoded.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Validates then normalizes in one step, for callers that need both.
pub fn validate_and_normalize(raw: &str) -> Result<String, PathError> {
    validate(raw)?;
    Ok(normalize(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_single_trailing_slash() {
        assert_eq!(normalize("/chat/"), "/chat");
        assert_eq!(normalize("/chat"), "/chat");
    }

    #[test]
    fn normalize_keeps_root_as_root() {
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn normalize_decodes_percent_escapes_before_trimming() {
        assert_eq!(normalize("/chat%2Froom/"), "/chat/room");
    }

    #[test]
    fn normalize_is_idempotent() {
        for p in ["/chat/", "/chat", "/", "/a/b/c/"] {
            let once = normalize(p);
            let twice = normalize(&once);
            assert_eq!(once, twice, "normalize should be idempotent for {p:?}");
        }
    }

    #[test]
    fn validate_rejects_empty_non_absolute_and_query_fragment() {
        assert_eq!(validate(""), Err(PathError::Empty));
        assert_eq!(validate("chat"), Err(PathError::NotAbsolute));
        assert_eq!(validate("/chat?x=1"), Err(PathError::HasQueryOrFragment));
        assert_eq!(validate("/chat#frag"), Err(PathError::HasQueryOrFragment));
        assert_eq!(validate("/chat"), Ok(()));
    }

    #[test]
    fn validate_and_normalize_composes_both_steps() {
        assert_eq!(validate_and_normalize("/chat/").unwrap(), "/chat");
        assert_eq!(validate_and_normalize("chat"), Err(PathError::NotAbsolute));
    }
}
