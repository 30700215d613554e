//! Event directories and the date window used to select them

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::codec::DirectoryDateCodec;
use super::errors::DomainError;

// ============================================================================
// EventDirectory
// ============================================================================

/// A directory holding the image sequence of one motion-detection event
///
/// The timestamp is derived from the path via [`DirectoryDateCodec`]; an
/// `EventDirectory` can only be built for paths that decode successfully.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventDirectory {
    path: PathBuf,
    timestamp: NaiveDateTime,
}

impl EventDirectory {
    /// Builds an event directory from its path
    ///
    /// # Errors
    /// Returns [`DomainError::MalformedPath`] if the path does not end in
    /// `YY/MM/DD/HH/mm`.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let path = path.into();
        let timestamp = DirectoryDateCodec::decode(&path)?;
        Ok(Self { path, timestamp })
    }

    /// The directory path as discovered
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The recording time encoded in the path
    #[must_use]
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

impl Display for EventDirectory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

// ============================================================================
// DateRange
// ============================================================================

/// Accepted date-time layouts for range bounds, tried in order
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Optional time window applied to event timestamps
///
/// Both bounds are exclusive: a timestamp qualifies if it is strictly after
/// `from` and strictly before `to`. A missing bound leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    from: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
}

impl DateRange {
    /// Creates a range from optional bounds
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidDateRange`] if both bounds are present
    /// and `from` is not strictly before `to` (such a range can never match).
    pub fn new(
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Result<Self, DomainError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from >= to {
                return Err(DomainError::InvalidDateRange {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
        }
        Ok(Self { from, to })
    }

    /// A range with no bounds; every timestamp qualifies
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Parses optional ISO-8601 bounds (see [`parse_bound`](Self::parse_bound))
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self, DomainError> {
        let from = from.map(Self::parse_bound).transpose()?;
        let to = to.map(Self::parse_bound).transpose()?;
        Self::new(from, to)
    }

    /// Parses a single ISO-8601 bound
    ///
    /// Accepts a plain date (`2019-01-01`, meaning midnight), a local
    /// date-time with or without seconds, separated by `T` or a space, or a
    /// full RFC 3339 timestamp which is converted to local time.
    pub fn parse_bound(input: &str) -> Result<NaiveDateTime, DomainError> {
        let input = input.trim();

        if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(midnight);
            }
        }

        for format in DATE_TIME_FORMATS {
            if let Ok(ts) = NaiveDateTime::parse_from_str(input, format) {
                return Ok(ts);
            }
        }

        DateTime::parse_from_rfc3339(input)
            .map(|ts| ts.with_timezone(&Local).naive_local())
            .map_err(|_| DomainError::InvalidDate(input.to_string()))
    }

    /// Returns true if `timestamp` lies strictly inside the window
    #[must_use]
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.from.map_or(true, |from| timestamp > from)
            && self.to.map_or(true, |to| timestamp < to)
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (self.from, self.to) {
            (None, None) => write!(f, "(unbounded)"),
            (Some(from), None) => write!(f, "after {from}"),
            (None, Some(to)) => write!(f, "before {to}"),
            (Some(from), Some(to)) => write!(f, "{from} .. {to}"),
        }
    }
}
