mod codec;
mod endpoint;
mod error;
mod mode;

pub use codec::{Codec, IdentityCodec, ZstdCodec};
pub use endpoint::parse_endpoint_list;
pub use error::WireError;
pub use mode::Mode;
