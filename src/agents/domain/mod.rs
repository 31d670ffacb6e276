//! Domain types for the agent toolkit
//!
//! Conversations, tool calls and completion results shared by the loop,
//! the resolver and the collaborator adapters.

mod conversation;
mod message;
mod response;
mod tool_call;

pub use conversation::*;
pub use message::*;
pub use response::*;
pub use tool_call::*;
