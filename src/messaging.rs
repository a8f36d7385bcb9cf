//! Discord messaging: gateway adapter, reply chunking, presence.

pub mod chunking;
pub mod discord;
pub mod presence;

pub use chunking::{MESSAGE_LIMIT, split_response};
pub use discord::{DiscordReplySink, Handler};
