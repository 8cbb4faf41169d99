use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

/// Nanoseconds since the Unix epoch, good till 2554 or so.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Nanos(pub u64);

impl Nanos {
    pub const ZERO: Nanos = Nanos(0);

    #[inline]
    pub fn now() -> Self {
        let d = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Nanos(d.as_nanos() as u64)
    }

    #[inline]
    pub fn elapsed(self) -> std::time::Duration {
        Nanos::now().0.saturating_sub(self.0).into()
    }

    /// Renders as `YYYY-MM-DD HH:MM:SS`, the timestamp prefix used by the
    /// plain dump formats (`plain-time`, `plain-time-flags`).
    pub fn format_dump_prefix(self) -> String {
        let dt: DateTime<Utc> = UNIX_EPOCH
            .checked_add(std::time::Duration::from_nanos(self.0))
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(Utc::now);
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

impl From<u64> for Nanos {
    fn from(value: u64) -> Self {
        Nanos(value)
    }
}

impl From<Nanos> for std::time::Duration {
    fn from(value: Nanos) -> Self {
        std::time::Duration::from_nanos(value.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_dump_prefix_is_well_shaped() {
        let n = Nanos::now();
        let s = n.format_dump_prefix();
        assert_eq!(s.len(), "YYYY-MM-DD HH:MM:SS".len());
        assert_eq!(s.as_bytes()[4], b'-');
        assert_eq!(s.as_bytes()[13], b':');
    }
}
