pub mod broker_message;
pub mod config;
pub mod joint_command;

pub use broker_message::*;
pub use config::*;
pub use joint_command::*;
