use common::storage::ByteRange;

/// How to answer a request given its `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// No usable range: send the whole body with 200.
    Full,
    /// Send the given bytes with 206.
    Partial(ByteRange),
    /// Syntactically valid but outside the resource: answer 416.
    Unsatisfiable,
}

/// Interpret a `Range` header against a resource of `size` bytes.
///
/// Only a single `bytes=` range is honored. Malformed values, other units, and
/// multi-range requests fall back to [`RangeRequest::Full`].
pub fn parse_range(value: Option<&str>, size: u64) -> RangeRequest {
    let Some(value) = value else {
        return RangeRequest::Full;
    };
    let Some(ranges) = value.trim().strip_prefix("bytes=") else {
        return RangeRequest::Full;
    };
    if ranges.contains(',') {
        return RangeRequest::Full;
    }
    let Some((start_str, end_str)) = ranges.trim().split_once('-') else {
        return RangeRequest::Full;
    };
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    if start_str.is_empty() {
        // Suffix range: last N bytes.
        let Ok(suffix_len) = end_str.parse::<u64>() else {
            return RangeRequest::Full;
        };
        if suffix_len == 0 || size == 0 {
            return RangeRequest::Unsatisfiable;
        }
        return partial(size.saturating_sub(suffix_len), size - 1, size);
    }

    let Ok(start) = start_str.parse::<u64>() else {
        return RangeRequest::Full;
    };
    let end = if end_str.is_empty() {
        u64::MAX
    } else {
        match end_str.parse::<u64>() {
            Ok(end) if end >= start => end,
            _ => return RangeRequest::Full,
        }
    };
    if start >= size {
        return RangeRequest::Unsatisfiable;
    }
    partial(start, end.min(size - 1), size)
}

fn partial(start: u64, end: u64, size: u64) -> RangeRequest {
    match ByteRange::new(start, end, size) {
        Ok(range) => RangeRequest::Partial(range),
        Err(_) => RangeRequest::Unsatisfiable,
    }
}
