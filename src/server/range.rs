//! `Range` header parsing (RFC 7233 byte ranges).

use thiserror::Error;

/// One resolved byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpRange {
    pub start: u64,
    pub length: u64,
}

impl HttpRange {
    /// Exclusive end offset
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// `Content-Range` header value for this range
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end().saturating_sub(1), size)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("invalid range")]
    Invalid,

    /// Every range starts at or after the end of the content
    #[error("invalid range: failed to overlap")]
    NoOverlap,
}

/// Parse a `Range` header value against a content of `size` bytes.
///
/// An empty header yields no ranges. Ranges starting past the content are
/// dropped; if that leaves none, the result is [`RangeError::NoOverlap`].
/// Several ranges may be returned; callers decide whether to accept them.
pub fn parse_range(header: &str, size: u64) -> Result<Vec<HttpRange>, RangeError> {
    if header.is_empty() {
        return Ok(Vec::new());
    }
    let specs = header.strip_prefix("bytes=").ok_or(RangeError::Invalid)?;

    let mut ranges = Vec::new();
    let mut no_overlap = false;
    for spec in specs.split(',') {
        let spec = spec.trim();
        if spec.is_empty() {
            continue;
        }
        let (start, end) = spec.split_once('-').ok_or(RangeError::Invalid)?;
        let (start, end) = (start.trim(), end.trim());

        if start.is_empty() {
            // -N: the last N bytes
            let suffix = parse_offset(end)?.min(size);
            ranges.push(HttpRange {
                start: size - suffix,
                length: suffix,
            });
            continue;
        }

        let start = parse_offset(start)?;
        if start >= size {
            no_overlap = true;
            continue;
        }
        let length = if end.is_empty() {
            size - start
        } else {
            let end = parse_offset(end)?;
            if start > end {
                return Err(RangeError::Invalid);
            }
            end.min(size - 1) - start + 1
        };
        ranges.push(HttpRange { start, length });
    }

    if no_overlap && ranges.is_empty() {
        return Err(RangeError::NoOverlap);
    }
    Ok(ranges)
}

fn parse_offset(s: &str) -> Result<u64, RangeError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Invalid);
    }
    s.parse().map_err(|_| RangeError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(start: u64, length: u64) -> Vec<HttpRange> {
        vec![HttpRange { start, length }]
    }

    #[test]
    fn test_closed_range() {
        assert_eq!(parse_range("bytes=0-99", 1000), Ok(single(0, 100)));
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(parse_range("bytes=-500", 1000), Ok(single(500, 500)));
        assert_eq!(parse_range("bytes=-5000", 1000), Ok(single(0, 1000)));
    }

    #[test]
    fn test_open_range() {
        assert_eq!(parse_range("bytes=900-", 1000), Ok(single(900, 100)));
    }

    #[test]
    fn test_end_clamped_to_size() {
        assert_eq!(parse_range("bytes=990-2000", 1000), Ok(single(990, 10)));
    }

    #[test]
    fn test_no_overlap() {
        assert_eq!(parse_range("bytes=2000-", 1000), Err(RangeError::NoOverlap));
        assert_eq!(
            parse_range("bytes=1000-1001, 1500-", 1000),
            Err(RangeError::NoOverlap)
        );
    }

    #[test]
    fn test_partial_overlap_keeps_valid_ranges() {
        assert_eq!(parse_range("bytes=2000-, 0-9", 1000), Ok(single(0, 10)));
    }

    #[test]
    fn test_invalid() {
        assert_eq!(parse_range("bogus", 1000), Err(RangeError::Invalid));
        assert_eq!(parse_range("bytes=abc", 1000), Err(RangeError::Invalid));
        assert_eq!(parse_range("bytes=5-1", 1000), Err(RangeError::Invalid));
        assert_eq!(parse_range("bytes=-", 1000), Err(RangeError::Invalid));
        assert_eq!(parse_range("bytes=--5", 1000), Err(RangeError::Invalid));
    }

    #[test]
    fn test_multiple_ranges_returned() {
        let ranges = parse_range("bytes=0-9, 20-29", 1000).unwrap();
        assert_eq!(ranges.len(), 2);
    }

    #[test]
    fn test_empty_header() {
        assert_eq!(parse_range("", 1000), Ok(Vec::new()));
    }

    #[test]
    fn test_content_range() {
        let range = HttpRange {
            start: 0,
            length: 100,
        };
        assert_eq!(range.content_range(1000), "bytes 0-99/1000");
    }
}
