//! Conversation state: session transcripts, active channels and reply tracking.

pub mod channels;
pub mod correlation;
pub mod session;

pub use channels::{ChannelStore, Toggle};
pub use correlation::{ReplyCorrelation, SentReply};
pub use session::{Role, SessionKey, SessionStore, Transcript, Turn};
