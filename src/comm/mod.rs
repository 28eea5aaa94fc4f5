//! Multi-node communication: targets, transports, the concurrent
//! communicator and the command abstraction on top of it.

mod command;
mod communicator;
mod outcome;
mod target;
mod transport;

pub use command::{CommandRun, CommunicationCommand, RemoteFailurePolicy};
pub use communicator::{CommunicationPolicy, NodeCommunicator};
pub use outcome::RequestOutcome;
pub use target::{Target, DEFAULT_AGENT_PORT};
pub use transport::{HttpTransport, NodeRequest, NodeTransport};
