pub mod endpoint;
pub mod monitor;
pub mod tcp;

mod egress;
mod egress_group;

pub use egress::EgressEndpoint;
pub use egress_group::EgressGroup;
pub use endpoint::{EndpointError, RelayEndpoint};
pub use monitor::{EventMask, SampledEvents};
pub use tcp::{AnyListener, AnyStream, PollEvent, RelayConnector, SendBehavior};
