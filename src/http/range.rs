//! HTTP Range request parsing module
//!
//! Range header parsing for partial content, compliant with RFC 7233.
//! Multiple ranges are kept in the order the client sent them; they are
//! neither sorted nor merged.

use crate::error::{Error, Result};

/// Half-open byte interval `[start, end)` inside an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    /// Build a range, rejecting empty and inverted intervals
    pub const fn new(start: u64, end: u64) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Exclusive end offset
    pub const fn end(&self) -> u64 {
        self.end
    }

    pub const fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Always false; empty ranges cannot be constructed
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// `Content-Range` value for this range of an object of `size` bytes
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{size}", self.start, self.end - 1)
    }
}

/// Parsed Range header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeRequestSpec {
    /// No Range header, serve the whole object
    Absent,
    /// Header present, but no range overlaps the object
    Unsatisfiable,
    /// Satisfiable ranges in request order
    Ranges(Vec<ByteRange>),
}

/// Parse an HTTP Range header against an object of `size` bytes
///
/// Supported formats (comma separated, bytes unit only):
/// - `start-end` - Specific range, `end` clamped to the last byte
/// - `start-` - From start to end of object
/// - `-suffix` - Last suffix bytes
///
/// Ranges starting at or past `size` are dropped; if none remain the
/// result is [`RangeRequestSpec::Unsatisfiable`]. Syntax errors yield
/// [`Error::InvalidRange`].
///
/// # Examples
/// ```
/// use bucket_ranger::http::range::{parse_range_header, RangeRequestSpec};
///
/// let spec = parse_range_header(Some("bytes=0-99"), 1000).unwrap();
/// assert!(matches!(spec, RangeRequestSpec::Ranges(ref r) if r.len() == 1));
///
/// let spec = parse_range_header(None, 1000).unwrap();
/// assert_eq!(spec, RangeRequestSpec::Absent);
/// ```
pub fn parse_range_header(range_header: Option<&str>, size: u64) -> Result<RangeRequestSpec> {
    let Some(header) = range_header else {
        return Ok(RangeRequestSpec::Absent);
    };

    let Some(specs) = header.trim().strip_prefix("bytes=") else {
        return Err(Error::InvalidRange("unsupported range unit"));
    };

    let mut ranges = Vec::new();
    let mut seen_any = false;
    for spec in specs.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        seen_any = true;
        let Some((start_str, end_str)) = spec.split_once('-') else {
            return Err(Error::InvalidRange("missing '-' in range"));
        };
        let (start_str, end_str) = (start_str.trim(), end_str.trim());

        // Suffix range: "-500" means last 500 bytes
        let range = if start_str.is_empty() {
            parse_suffix_range(end_str, size)?
        } else {
            parse_standard_range(start_str, end_str, size)?
        };
        ranges.extend(range);
    }

    if !seen_any {
        return Err(Error::InvalidRange("empty range set"));
    }
    if ranges.is_empty() {
        return Ok(RangeRequestSpec::Unsatisfiable);
    }
    Ok(RangeRequestSpec::Ranges(ranges))
}

fn parse_number(s: &str) -> Result<u64> {
    // u64::from_str accepts a leading '+', HTTP does not
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidRange("range bound is not a number"));
    }
    s.parse::<u64>()
        .map_err(|_| Error::InvalidRange("range bound out of bounds"))
}

/// Parse suffix range (e.g., "-500")
fn parse_suffix_range(suffix_str: &str, size: u64) -> Result<Option<ByteRange>> {
    let suffix = parse_number(suffix_str)?;
    // Suffix larger than the object selects the whole object
    let start = size.saturating_sub(suffix);
    Ok(ByteRange::new(start, size))
}

/// Parse standard range (e.g., "0-99" or "100-")
fn parse_standard_range(start_str: &str, end_str: &str, size: u64) -> Result<Option<ByteRange>> {
    let start = parse_number(start_str)?;

    let last = if end_str.is_empty() {
        None
    } else {
        let last = parse_number(end_str)?;
        if start > last {
            return Err(Error::InvalidRange("range start after range end"));
        }
        Some(last)
    };

    // Start beyond object size is not satisfiable
    if start >= size {
        return Ok(None);
    }

    // Clamp end to size - 1
    let end = last.map_or(size, |l| l.saturating_add(1).min(size));
    Ok(ByteRange::new(start, end))
}
