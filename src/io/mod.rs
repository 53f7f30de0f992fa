//! Conversation I/O: blocking input, batched output and transports

pub mod input;
pub mod output;
pub mod transport;

pub use input::{input_channel, InputEvent, InputHandle, InputReceiver};
pub use output::OutputBuffer;
pub use transport::{ConsoleTransport, RecordingTransport, Transport, WebhookTransport};
