use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use relay_timing::Nanos;
use relay_wire::{Codec, IdentityCodec};
use tracing::warn;

use crate::error::SpoolError;
use crate::format::DumpFormat;
use crate::lock::ExclusiveLock;

/// `00 7A 6C 6D 62`, as named in spec §3/§6. Readers reject anything else.
const MAGIC: [u8; 5] = [0x00, 0x7A, 0x6C, 0x6D, 0x62];

/// Append-only local dump file (spec §3 "Dump Spooler State", §4.1). Holds
/// an open write handle lazily (opened on first [`write`](Spooler::write),
/// closed when the final frame of a message is written) and, independently,
/// an open read handle for replay via [`read`](Spooler::read).
pub struct Spooler {
    format: DumpFormat,
    path: PathBuf,
    read_offset: u64,
    write_handle: Option<File>,
    read_handle: Option<File>,
    codec: Arc<dyn Codec>,
}

impl Spooler {
    /// `path` must be non-empty. Does no I/O (spec §4.1).
    pub fn init(path: impl Into<PathBuf>, format: DumpFormat) -> Result<Self, SpoolError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(SpoolError::EmptyPath);
        }
        Ok(Self { format, path, read_offset: 0, write_handle: None, read_handle: None, codec: Arc::new(IdentityCodec) })
    }

    /// Plain-format writes decompress a payload that passes `codec`'s
    /// validity check before storing it (spec §3 "Plain" format); the
    /// binary format always stores raw bytes.
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> DumpFormat {
        self.format
    }

    pub fn read_offset(&self) -> u64 {
        self.read_offset
    }

    /// Appends one record. Opens the file in append mode if not already
    /// open, takes an exclusive advisory lock for the duration of the
    /// write, and — when `more` is false (last frame of the message) —
    /// closes the handle afterward. On any failure the handle is left open
    /// exactly as it was (spec §4.1 "Failure semantics": "all write
    /// failures leave the record unchanged and the handle open").
    pub fn write(&mut self, payload: &[u8], more: bool) -> Result<(), SpoolError> {
        let flags: i32 = i32::from(more);

        if self.write_handle.is_none() {
            let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            self.write_handle = Some(file);
        }
        let file = self.write_handle.as_ref().expect("just opened");

        let lock = ExclusiveLock::acquire(file).map_err(|_| SpoolError::Lock)?;
        let result = match self.format {
            DumpFormat::Binary => write_binary_record(file, payload, flags),
            _ => write_plain_record(file, payload, flags, self.format, self.codec.as_ref()),
        };
        drop(lock);
        result?;

        if flags == 0 {
            self.write_handle = None;
        }
        Ok(())
    }

    /// Closes any open write handle.
    pub fn close(&mut self) {
        self.write_handle = None;
    }

    /// Opens the file for sequential read and resets `read_offset` to 0.
    pub fn read_open(&mut self) -> Result<(), SpoolError> {
        self.read_handle = Some(File::open(&self.path)?);
        self.read_offset = 0;
        Ok(())
    }

    /// Reads one binary record. `read_open` is implied on first call if not
    /// already called. Returns:
    /// - `Ok(Some((payload, more)))` for a record,
    /// - `Ok(None)` at clean EOF,
    /// - `Err` on bad magic, a short read within a record, or a zero-length
    ///   record mid-stream (spec §4.1) — the caller should abort replay but
    ///   may keep the relay running (spec §7).
    ///
    /// Advances `read_offset` by every byte consumed (magic + flags + size
    /// + payload), which is what `truncate` uses as the cut point.
    pub fn read(&mut self) -> Result<Option<(Vec<u8>, bool)>, SpoolError> {
        if self.format != DumpFormat::Binary {
            warn!("relay-spool: read() called on a plain-format dump; plain dumps are write-only replay sources for humans, not this API");
        }
        if self.read_handle.is_none() {
            self.read_open()?;
        }
        let file = self.read_handle.as_mut().expect("just opened");

        let mut magic = [0u8; 5];
        let n = read_fully(file, &mut magic)?;
        if n == 0 {
            return Ok(None);
        }
        if n < magic.len() {
            return Err(SpoolError::ShortRecord);
        }
        if magic != MAGIC {
            return Err(SpoolError::BadMagic);
        }
        self.read_offset += magic.len() as u64;

        let mut flags_buf = [0u8; 4];
        if read_fully(file, &mut flags_buf)? != flags_buf.len() {
            return Err(SpoolError::ShortRecord);
        }
        let flags = i32::from_le_bytes(flags_buf);
        self.read_offset += flags_buf.len() as u64;

        let mut size_buf = [0u8; 8];
        if read_fully(file, &mut size_buf)? != size_buf.len() {
            return Err(SpoolError::ShortRecord);
        }
        let size = u64::from_le_bytes(size_buf);
        self.read_offset += size_buf.len() as u64;

        if size == 0 {
            return Err(SpoolError::ZeroLengthRecord);
        }

        let mut payload = vec![0u8; size as usize];
        if read_fully(file, &mut payload)? != payload.len() {
            return Err(SpoolError::ShortRecord);
        }
        self.read_offset += size;

        Ok(Some((payload, flags != 0)))
    }

    /// Discards bytes `[0, read_offset)`: copies the suffix starting at
    /// `read_offset` into a sibling temp file under an exclusive lock, then
    /// renames it over the original (atomic at the filesystem boundary).
    /// Idempotent when `read_offset == 0` (full copy-and-replace).
    pub fn truncate(&mut self) -> Result<(), SpoolError> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.read_offset))?;

        let lock = ExclusiveLock::acquire(&file).map_err(|_| SpoolError::Lock)?;
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        let copy_result = io::copy(&mut file, tmp.as_file_mut());
        drop(lock);
        copy_result?;

        tmp.persist(&self.path).map_err(|e| SpoolError::Io(e.error))?;
        self.read_offset = 0;
        Ok(())
    }
}

fn read_fully(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

fn write_binary_record(mut file: &File, payload: &[u8], flags: i32) -> Result<(), SpoolError> {
    let expected = MAGIC.len() + 4 + 8 + payload.len();
    let mut written = 0;
    file.write_all(&MAGIC)?;
    written += MAGIC.len();
    file.write_all(&flags.to_le_bytes())?;
    written += 4;
    file.write_all(&(payload.len() as u64).to_le_bytes())?;
    written += 8;
    file.write_all(payload)?;
    written += payload.len();
    if written != expected {
        return Err(SpoolError::ShortWrite { wrote: written, expected });
    }
    Ok(())
}

/// `[YYYY-MM-DD HH:MM:SS] ` and/or `[flags] ` prefixes per `format`, then
/// the payload (decompressed if `codec` recognizes it as compressed,
/// otherwise raw), then a newline.
///
/// Open question (spec §9): a payload containing embedded newlines is
/// written as-is here, exactly as the reference implementation does; this
/// can make a plain-format dump ambiguous to re-split by line. Documented,
/// not silently patched.
fn write_plain_record(
    mut file: &File,
    payload: &[u8],
    flags: i32,
    format: DumpFormat,
    codec: &dyn Codec,
) -> Result<(), SpoolError> {
    if format.has_time_prefix() {
        write!(file, "[{}] ", Nanos::now().format_dump_prefix())?;
    }
    if format.has_flags_prefix() {
        write!(file, "[{flags}] ")?;
    }
    let bytes = if codec.looks_compressed(payload) {
        codec.decompress(payload).unwrap_or_else(|_| payload.to_vec())
    } else {
        payload.to_vec()
    };
    file.write_all(&bytes)?;
    file.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use relay_wire::ZstdCodec;
    use tempfile::tempdir;

    use super::*;

    fn path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        dir.path().join(name)
    }

    #[test]
    fn init_rejects_empty_path() {
        assert!(matches!(Spooler::init("", DumpFormat::Binary), Err(SpoolError::EmptyPath)));
    }

    #[test]
    fn binary_write_then_read_roundtrips_and_truncate_empties_file() {
        let dir = tempdir().unwrap();
        let p = path(&dir, "d.bin");
        let mut spooler = Spooler::init(&p, DumpFormat::Binary).unwrap();

        spooler.write(b"a", true).unwrap();
        spooler.write(b"b", true).unwrap();
        spooler.write(b"c", false).unwrap();

        let mut spooler = Spooler::init(&p, DumpFormat::Binary).unwrap();
        assert_eq!(spooler.read().unwrap(), Some((b"a".to_vec(), true)));
        assert_eq!(spooler.read().unwrap(), Some((b"b".to_vec(), true)));
        assert_eq!(spooler.read().unwrap(), Some((b"c".to_vec(), false)));
        assert_eq!(spooler.read().unwrap(), None);

        spooler.truncate().unwrap();
        assert_eq!(std::fs::metadata(&p).unwrap().len(), 0);
    }

    #[test]
    fn partial_read_then_truncate_keeps_only_the_suffix() {
        let dir = tempdir().unwrap();
        let p = path(&dir, "d.bin");
        let mut spooler = Spooler::init(&p, DumpFormat::Binary).unwrap();
        for i in 0..10u8 {
            let more = i != 9;
            spooler.write(&[i], more).unwrap();
        }

        let mut spooler = Spooler::init(&p, DumpFormat::Binary).unwrap();
        for i in 0..4u8 {
            assert_eq!(spooler.read().unwrap().unwrap().0, vec![i]);
        }
        spooler.truncate().unwrap();

        let mut spooler = Spooler::init(&p, DumpFormat::Binary).unwrap();
        for i in 4..10u8 {
            assert_eq!(spooler.read().unwrap().unwrap().0, vec![i]);
        }
        assert_eq!(spooler.read().unwrap(), None);
    }

    #[test]
    fn read_rejects_bad_magic() {
        let dir = tempdir().unwrap();
        let p = path(&dir, "d.bin");
        std::fs::write(&p, b"not a dump file at all").unwrap();
        let mut spooler = Spooler::init(&p, DumpFormat::Binary).unwrap();
        assert!(matches!(spooler.read(), Err(SpoolError::BadMagic)));
    }

    #[test]
    fn plain_text_write_appends_newline_terminated_payloads() {
        let dir = tempdir().unwrap();
        let p = path(&dir, "d.txt");
        let mut spooler = Spooler::init(&p, DumpFormat::PlainText).unwrap();
        spooler.write(b"hello", false).unwrap();
        spooler.write(b"world", false).unwrap();
        let contents = std::fs::read_to_string(&p).unwrap();
        assert_eq!(contents, "hello\nworld\n");
    }

    #[test]
    fn plain_flags_write_includes_bracketed_flags_prefix() {
        let dir = tempdir().unwrap();
        let p = path(&dir, "d.txt");
        let mut spooler = Spooler::init(&p, DumpFormat::PlainFlags).unwrap();
        spooler.write(b"x", true).unwrap();
        spooler.write(b"y", false).unwrap();
        let contents = std::fs::read_to_string(&p).unwrap();
        assert_eq!(contents, "[1] x\n[0] y\n");
    }

    #[test]
    fn plain_format_decompresses_valid_codec_payloads() {
        let dir = tempdir().unwrap();
        let p = path(&dir, "d.txt");
        let codec = ZstdCodec::new(3);
        let compressed = codec.compress(b"payload bytes").unwrap();
        let mut spooler = Spooler::init(&p, DumpFormat::PlainText).unwrap().with_codec(Arc::new(codec));
        spooler.write(&compressed, false).unwrap();
        let contents = std::fs::read_to_string(&p).unwrap();
        assert_eq!(contents, "payload bytes\n");
    }

    #[test]
    fn write_to_unopenable_path_errors_without_panicking() {
        let dir = tempdir().unwrap();
        let p = path(&dir, "missing-dir").join("d.bin");
        let mut spooler = Spooler::init(&p, DumpFormat::Binary).unwrap();
        assert!(spooler.write(b"a", false).is_err());
        assert!(spooler.write(b"b", false).is_err());
    }
}
