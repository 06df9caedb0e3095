//! `Range` header parsing.
//!
//! Turns a header such as `bytes=0-99,-500` into a [`RangeSet`]: inclusive
//! byte ranges clamped to the resource, sorted by start offset, with
//! overlapping and touching ranges merged.

use super::error::RangeError;

/// An inclusive byte range inside a resource.
///
/// A `ByteRange` can only be built against a known resource size, so
/// `start <= end < size` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    /// Build a range, returning `None` unless `start <= end < size`.
    pub fn new(start: u64, end: u64, size: u64) -> Option<Self> {
        (start <= end && end < size).then_some(Self { start, end })
    }

    /// Range covering the whole resource, `None` for an empty resource.
    pub fn whole(size: u64) -> Option<Self> {
        size.checked_sub(1).map(|end| Self { start: 0, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes covered. Never zero.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for this range of a `size`-byte resource.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Normalized set of byte ranges.
///
/// Ranges are sorted ascending and no two of them overlap or touch. An empty
/// set means "nothing satisfiable", which is not the same thing as a request
/// without a `Range` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeSet {
    ranges: Vec<ByteRange>,
}

impl RangeSet {
    /// Parse a `Range` header value against a resource of `size` bytes.
    ///
    /// Structural problems (wrong unit, a sub-range without `-`, non-numeric
    /// bounds) fail with [`RangeError::MalformedRangeSyntax`]. Sub-ranges that
    /// are well formed but fall outside the resource are dropped, so the
    /// result may be empty.
    pub fn parse(header: &str, size: u64) -> Result<Self, RangeError> {
        let spec = strip_unit(header.trim())
            .ok_or_else(|| RangeError::malformed(size, "expected the `bytes=` unit"))?;

        let mut accepted = Vec::new();
        for item in spec.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }

            let (start, end) = item
                .split_once('-')
                .ok_or_else(|| RangeError::malformed(size, "sub-range is missing `-`"))?;

            if let Some(range) = resolve_item(start.trim(), end.trim(), size)? {
                accepted.push(range);
            }
        }

        Ok(Self::merged(accepted))
    }

    /// Like [`RangeSet::parse`], but an empty result becomes
    /// [`RangeError::UnsatisfiableRange`].
    pub fn parse_satisfiable(header: &str, size: u64) -> Result<Self, RangeError> {
        let set = Self::parse(header, size)?;
        if set.is_empty() {
            return Err(RangeError::unsatisfiable(size));
        }
        Ok(set)
    }

    /// Sort and coalesce ranges that overlap or are byte-adjacent.
    pub fn merged(mut ranges: Vec<ByteRange>) -> Self {
        ranges.sort_unstable_by_key(|range| (range.start, range.end));

        let mut merged: Vec<ByteRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if range.start <= last.end.saturating_add(1) => {
                    last.end = last.end.max(range.end);
                }
                _ => merged.push(range),
            }
        }

        Self { ranges: merged }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn first(&self) -> Option<ByteRange> {
        self.ranges.first().copied()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ByteRange> {
        self.ranges.iter()
    }
}

impl IntoIterator for RangeSet {
    type Item = ByteRange;
    type IntoIter = std::vec::IntoIter<ByteRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.into_iter()
    }
}

impl<'a> IntoIterator for &'a RangeSet {
    type Item = &'a ByteRange;
    type IntoIter = std::slice::Iter<'a, ByteRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

/// Return the part after `bytes=`; the unit is matched case-insensitively.
fn strip_unit(value: &str) -> Option<&str> {
    let (unit, spec) = value.split_once('=')?;
    if !unit.eq_ignore_ascii_case("bytes") || spec.trim().is_empty() {
        return None;
    }
    Some(spec)
}

/// Turn one `start-end`, `start-` or `-length` item into a range.
///
/// `Ok(None)` means the item was valid but unsatisfiable and is dropped.
fn resolve_item(start: &str, end: &str, size: u64) -> Result<Option<ByteRange>, RangeError> {
    if start.is_empty() {
        let length = parse_signed_bound(end)
            .ok_or_else(|| RangeError::malformed(size, "invalid suffix length"))?;
        let Some(length) = length.filter(|&length| length > 0) else {
            return Ok(None);
        };
        if size == 0 {
            return Ok(None);
        }
        return Ok(ByteRange::new(size.saturating_sub(length), size - 1, size));
    }

    let start = parse_bound(start).ok_or_else(|| RangeError::malformed(size, "invalid start"))?;
    let end = if end.is_empty() {
        None
    } else {
        let end =
            parse_signed_bound(end).ok_or_else(|| RangeError::malformed(size, "invalid end"))?;
        // A negative end can never follow a non-negative start.
        let Some(end) = end else {
            return Ok(None);
        };
        Some(end)
    };

    let Some(last) = size.checked_sub(1) else {
        return Ok(None);
    };
    let end = end.unwrap_or(last);

    if start > end || start >= size {
        return Ok(None);
    }

    Ok(ByteRange::new(start, end.min(last), size))
}

/// Parse an unsigned decimal bound. Values too large for `u64` saturate,
/// which the caller then clamps or discards like any other oversized bound.
fn parse_bound(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(text.parse().unwrap_or(u64::MAX))
}

/// Parse a bound that may carry a leading `-`.
///
/// The inner `None` marks a negative value, which the caller discards. `-0`
/// is plain zero.
fn parse_signed_bound(text: &str) -> Option<Option<u64>> {
    match text.strip_prefix('-') {
        Some(digits) => parse_bound(digits).map(|value| (value == 0).then_some(0)),
        None => parse_bound(text).map(Some),
    }
}
