//! Event directory date codec
//!
//! Event directories are nested so that their trailing five path segments
//! encode the moment the event was recorded: `.../YY/MM/DD/HH/mm`.
//! Two-digit years always map to `20YY`.

use std::ffi::OsStr;
use std::path::{Component, Path};

use chrono::{NaiveDate, NaiveDateTime};

use super::errors::DomainError;

/// Number of trailing path segments that encode the timestamp
pub const EVENT_PATH_SEGMENTS: usize = 5;

/// Century added to every two-digit year (`19` -> `2019`)
pub const CENTURY_BASE: i32 = 2000;

/// Decodes timestamps from event directory paths
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryDateCodec;

impl DirectoryDateCodec {
    /// Decodes the `YY/MM/DD/HH/mm` suffix of `path` into a minute-resolution timestamp
    ///
    /// Each of the five trailing segments must be exactly two ASCII digits
    /// and together they must form a valid calendar date and time of day.
    ///
    /// # Errors
    /// Returns [`DomainError::MalformedPath`] if the suffix is missing,
    /// non-numeric, or out of range (e.g. month `13`, `02/30`).
    pub fn decode(path: &Path) -> Result<NaiveDateTime, DomainError> {
        let malformed = || DomainError::MalformedPath(path.display().to_string());

        let segments: Vec<&OsStr> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(segment) => Some(segment),
                _ => None,
            })
            .collect();

        if segments.len() < EVENT_PATH_SEGMENTS {
            return Err(malformed());
        }

        let mut fields = [0u32; EVENT_PATH_SEGMENTS];
        let suffix = &segments[segments.len() - EVENT_PATH_SEGMENTS..];
        for (field, segment) in fields.iter_mut().zip(suffix) {
            *field = parse_two_digits(segment).ok_or_else(malformed)?;
        }

        let [year, month, day, hour, minute] = fields;
        NaiveDate::from_ymd_opt(CENTURY_BASE + year as i32, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .ok_or_else(malformed)
    }
}

fn parse_two_digits(segment: &OsStr) -> Option<u32> {
    let s = segment.to_str()?;
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_decode_components_match_segments() {
        let ts = DirectoryDateCodec::decode(Path::new("/var/events/1/19/03/04/21/22")).unwrap();
        assert_eq!(ts.year(), 2019);
        assert_eq!(ts.month(), 3);
        assert_eq!(ts.day(), 4);
        assert_eq!(ts.hour(), 21);
        assert_eq!(ts.minute(), 22);
        assert_eq!(ts.second(), 0);
    }

    #[test]
    fn test_decode_relative_path() {
        let ts = DirectoryDateCodec::decode(Path::new("events/00/01/01/00/00")).unwrap();
        assert_eq!(ts.year(), 2000);
        assert_eq!(ts.month(), 1);
    }

    #[test]
    fn test_decode_exactly_five_segments() {
        let ts = DirectoryDateCodec::decode(Path::new("99/12/31/23/59")).unwrap();
        assert_eq!(ts.year(), 2099);
        assert_eq!(ts.minute(), 59);
    }

    #[test]
    fn test_decode_trailing_separator() {
        assert!(DirectoryDateCodec::decode(Path::new("/events/19/03/04/21/22/")).is_ok());
    }

    #[test]
    fn test_decode_too_few_segments() {
        let err = DirectoryDateCodec::decode(Path::new("/19/03/04/21")).unwrap_err();
        assert!(matches!(err, DomainError::MalformedPath(_)));
    }

    #[test]
    fn test_decode_non_numeric_segment() {
        assert!(DirectoryDateCodec::decode(Path::new("/events/19/03/04/21/ab")).is_err());
        assert!(DirectoryDateCodec::decode(Path::new("/events/19/03/04/21/.2")).is_err());
    }

    #[test]
    fn test_decode_wrong_width() {
        assert!(DirectoryDateCodec::decode(Path::new("/events/2019/03/04/21/22")).is_err());
        assert!(DirectoryDateCodec::decode(Path::new("/events/19/3/04/21/22")).is_err());
    }

    #[test]
    fn test_decode_out_of_range() {
        assert!(DirectoryDateCodec::decode(Path::new("/e/19/13/04/21/22")).is_err());
        assert!(DirectoryDateCodec::decode(Path::new("/e/19/02/30/21/22")).is_err());
        assert!(DirectoryDateCodec::decode(Path::new("/e/19/03/04/24/22")).is_err());
        assert!(DirectoryDateCodec::decode(Path::new("/e/19/03/04/21/60")).is_err());
        assert!(DirectoryDateCodec::decode(Path::new("/e/19/00/04/21/22")).is_err());
    }

    #[test]
    fn test_decode_leap_day() {
        assert!(DirectoryDateCodec::decode(Path::new("/e/20/02/29/00/00")).is_ok());
        assert!(DirectoryDateCodec::decode(Path::new("/e/19/02/29/00/00")).is_err());
    }
}
