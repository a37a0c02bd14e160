pub mod listener;
pub mod registry;
pub mod relay;
pub mod request;
pub mod socket;
pub mod tune;

pub use listener::{RunningUdpListener, UdpListener, MAX_READS_PER_WAKEUP};
pub use registry::RequestRegistry;
pub use relay::{ReadOutcome, Relay, SendStatus, TimerEvent};
pub use request::{Completion, Request, RequestId, RequestState, SendOp, SocketRole};
pub use socket::DatagramSocket;
