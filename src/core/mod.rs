pub mod config;
pub mod error;
pub mod types;

pub use config::{DispatchConfig, Messages, OutputConfig};
pub use error::{ConfigError, DispatchError, Result};
pub use types::{ConversationId, Flags, GroupId, UserId};
