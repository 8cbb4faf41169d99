mod error;
mod inproc;
mod interrupt;
mod readiness;

pub use error::CommError;
pub use inproc::{InprocHub, InprocMessage, global as global_inproc_hub};
pub use interrupt::InterruptFlag;
pub use readiness::Readiness;
