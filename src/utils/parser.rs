use log::error;
use regex::Regex;
use crate::errors::DriveError::ParseError;
use crate::errors::DriveResult;

// `bytes 0-1048575/3145728`, `bytes */0` or `bytes 0-9/*`
const CONTENT_RANGE_REGEX: &str = r"^bytes\s+(?:(\d+)-(\d+)|\*)/(\d+|\*)$";

/// Parsed `Content-Range` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContentRange {
    /// Inclusive byte range, absent for unsatisfied-range responses.
    pub(crate) range: Option<(u64, u64)>,
    /// Complete length of the object when the server knows it.
    pub(crate) total: Option<u64>,
}

pub(crate) fn parse_content_range(header: &str) -> DriveResult<ContentRange> {
    // SAFETY: The regex statement is const string so this is always Ok().
    let regex = Regex::new(CONTENT_RANGE_REGEX).unwrap();

    let capture = regex.captures(header.trim())
        .ok_or_else(|| {
            error!("Content-Range header is invalid: {}", header);
            ParseError(format!("Invalid Content-Range header: '{}'", header))
        })?;

    let parse_number = |value: &str| -> DriveResult<u64> {
        value.parse::<u64>()
            .map_err(|e| ParseError(format!("Invalid Content-Range number '{}': {}", value, e)))
    };

    let range = match (capture.get(1), capture.get(2)) {
        (Some(start), Some(end)) => {
            let (start, end) = (parse_number(start.as_str())?, parse_number(end.as_str())?);
            if end < start {
                return Err(ParseError(format!("Content-Range end is before start: '{}'", header)));
            }
            Some((start, end))
        },
        _ => None,
    };

    let total = match capture.get(3).map(|c| c.as_str()) {
        Some("*") | None => None,
        Some(total) => Some(parse_number(total)?),
    };

    Ok(ContentRange { range, total })
}

/// `Range` request header value for `len` bytes starting at `start`.
pub(crate) fn byte_range(start: u64, len: u64) -> String {
    format!("bytes={}-{}", start, start + len.max(1) - 1)
}
