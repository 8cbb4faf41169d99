use std::str::FromStr;

/// The two disjoint on-disk layouts a dump file can use (spec §3 "Dump
/// file"). The plain variants additionally control which optional prefixes
/// precede each line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DumpFormat {
    /// `[magic 5B][flags i32][size u64][payload]` per record.
    Binary,
    /// One payload per line, no prefix.
    PlainText,
    /// `[YYYY-MM-DD HH:MM:SS] ` prefix, then payload.
    PlainTime,
    /// `[flags] ` prefix, then payload.
    PlainFlags,
    /// Both prefixes, time first.
    PlainTimeFlags,
}

impl DumpFormat {
    pub fn is_plain(self) -> bool {
        !matches!(self, DumpFormat::Binary)
    }

    pub fn has_time_prefix(self) -> bool {
        matches!(self, DumpFormat::PlainTime | DumpFormat::PlainTimeFlags)
    }

    pub fn has_flags_prefix(self) -> bool {
        matches!(self, DumpFormat::PlainFlags | DumpFormat::PlainTimeFlags)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown dump type {0:?}")]
pub struct UnknownDumpFormat(String);

impl FromStr for DumpFormat {
    type Err = UnknownDumpFormat;

    /// Parses the `--client_dumptype`/`--subscribe_dumptype` values of spec
    /// §6: `binary`, `plain-text`, `plain-time`, `plain-flags`,
    /// `plain-time-flags` (alias `plain-flags-time`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(DumpFormat::Binary),
            "plain-text" => Ok(DumpFormat::PlainText),
            "plain-time" => Ok(DumpFormat::PlainTime),
            "plain-flags" => Ok(DumpFormat::PlainFlags),
            "plain-time-flags" | "plain-flags-time" => Ok(DumpFormat::PlainTimeFlags),
            other => Err(UnknownDumpFormat(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_dump_type() {
        assert_eq!(DumpFormat::from_str("binary").unwrap(), DumpFormat::Binary);
        assert_eq!(DumpFormat::from_str("plain-text").unwrap(), DumpFormat::PlainText);
        assert_eq!(DumpFormat::from_str("plain-time").unwrap(), DumpFormat::PlainTime);
        assert_eq!(DumpFormat::from_str("plain-flags").unwrap(), DumpFormat::PlainFlags);
        assert_eq!(DumpFormat::from_str("plain-time-flags").unwrap(), DumpFormat::PlainTimeFlags);
        assert_eq!(DumpFormat::from_str("plain-flags-time").unwrap(), DumpFormat::PlainTimeFlags);
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(DumpFormat::from_str("bogus").is_err());
    }
}
