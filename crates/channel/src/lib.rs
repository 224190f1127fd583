pub mod events;
pub mod socket;

pub use events::{ClientMessage, ServerMessage};
pub use socket::{
    ChannelTransport, EffectSink, NoopTransport, ProgressChannelRunner, ReconnectPolicy,
    RunOutcome, TransportError,
};
