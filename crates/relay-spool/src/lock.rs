use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;

/// RAII exclusive advisory lock (`flock(2)` `LOCK_EX`) held for the
/// duration of one record write/truncate (spec §3 invariant: "writes are
/// atomic per-record under an exclusive advisory file lock").
pub struct ExclusiveLock<'a> {
    file: &'a File,
}

impl<'a> ExclusiveLock<'a> {
    pub fn acquire(file: &'a File) -> io::Result<Self> {
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { file })
    }
}

impl Drop for ExclusiveLock<'_> {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}
