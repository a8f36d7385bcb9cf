//! Deciding when to answer and producing the answer.

pub mod eligibility;
pub mod pipeline;

pub use eligibility::{MessageFacts, RepliedTo, ResponsePolicy, should_respond};
pub use pipeline::{Inbound, Outcome, ReplyRemover, ReplySink, Responder, TypingGuard};
