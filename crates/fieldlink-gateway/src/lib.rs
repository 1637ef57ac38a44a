//! FieldLink gateway runtime.
//!
//! Ties the transport channels to the control loop: the [`Supervisor`]
//! keeps every device listener and the command router alive forever, the
//! [`CommandRouter`] turns inbound envelopes into outbound sends, and
//! [`Gateway`] assembles the whole pipeline from a [`GatewayConfig`].
//!
//! [`GatewayConfig`]: fieldlink_core::GatewayConfig

pub mod gateway;
pub mod router;
pub mod supervisor;

pub use gateway::{listener_tasks, Gateway};
pub use router::CommandRouter;
pub use supervisor::{SupervisedTask, Supervisor};

use fieldlink_channels::ChannelError;
use fieldlink_core::{ConfigError, Protocol};
use thiserror::Error;

/// Error type for gateway runtime operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A transport channel failed
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A receive session ended on a transport fault
    #[error("listener for {device_id} on {protocol} exited after a transport fault")]
    ListenerFault {
        /// Transport the listener was receiving on
        protocol: Protocol,
        /// Device the listener was receiving for
        device_id: String,
    },
}
