//! Line echo protocol.
//!
//! Every message is the byte sequence up to and including the next `\n`.
//! The server writes each message back unchanged, terminator included.
//!
//! ```text
//! Request:  hello\n
//! Response: hello\n
//! ```
//!
//! There is no escaping, no size limit and no error reply: a peer that
//! misbehaves is simply disconnected.

pub mod handler;
pub mod parser;

pub use handler::{handle_connection, CloseReason};
