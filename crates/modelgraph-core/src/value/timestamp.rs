use derive_more::Deref;
use std::fmt::{self, Display};
use time::{OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339};

///
/// Timestamp
///
/// Date-like primitive. Always normalized to UTC so the canonical wire string
/// is stable across parties.
///

#[derive(Clone, Copy, Debug, Deref, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    pub const UNIX_EPOCH: Self = Self(OffsetDateTime::UNIX_EPOCH);

    #[must_use]
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    #[must_use]
    pub fn from_unix_seconds(seconds: i64) -> Option<Self> {
        OffsetDateTime::from_unix_timestamp(seconds).ok().map(Self)
    }

    #[must_use]
    pub fn from_unix_millis(millis: i64) -> Option<Self> {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
            .ok()
            .map(Self)
    }

    /// Parse an RFC 3339 string, converting any offset to UTC.
    pub fn parse(encoded: &str) -> Result<Self, time::error::Parse> {
        let parsed = OffsetDateTime::parse(encoded, &Rfc3339)?;

        Ok(Self(parsed.to_offset(UtcOffset::UTC)))
    }

    /// Canonical RFC 3339 rendering used on the wire.
    pub fn to_rfc3339(&self) -> Result<String, time::error::Format> {
        self.0.format(&Rfc3339)
    }

    #[must_use]
    pub const fn unix_seconds(&self) -> i64 {
        self.0.unix_timestamp()
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(value: OffsetDateTime) -> Self {
        Self(value.to_offset(UtcOffset::UTC))
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Ok(s) => write!(f, "{s}"),
            Err(_) => write!(f, "{}", self.0),
        }
    }
}

///
/// TESTS
///
