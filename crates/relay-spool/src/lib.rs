mod error;
mod format;
mod lock;
mod spooler;

pub use error::SpoolError;
pub use format::{DumpFormat, UnknownDumpFormat};
pub use spooler::Spooler;
