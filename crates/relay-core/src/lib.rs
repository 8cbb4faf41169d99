pub mod egress;
mod error;
pub mod ingress;
pub mod keys;
pub mod orchestrator;
pub mod relay_loop;

pub use egress::{BoundEgress, Egress, GroupEgress, InprocEgress};
pub use error::RelayError;
pub use ingress::Ingress;
pub use keys::{PublishKey, SubscribeKey};
pub use orchestrator::Orchestrator;
pub use relay_loop::{RelayLoop, RelayLoopConfig};
