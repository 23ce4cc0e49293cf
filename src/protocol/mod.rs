//! Wire protocol between the supervisor and its workers.
//!
//! Every message is one frame: a 4-byte big-endian length followed by a
//! JSON-encoded [`Message`]. The same protocol runs over a child process's
//! stdin/stdout and over a TCP connection to a detached worker.
//!
//! ```text
//! server                         worker
//!   │ ◄────────── Ready ───────────│
//!   │ ─────── StatusQuery ───────► │
//!   │ ◄──── Status{busy:false} ────│
//!   │ ────────── Task ───────────► │
//!   │ ◄─────── TaskStarted ────────│
//!   │ ◄── TaskCompleted/Failed ────│
//! ```

mod frame;
mod message;

pub use frame::{
    encode_frame, read_raw_frame, FrameReader, FrameWriter, ProtocolError, MAX_FRAME_LEN,
};
pub use message::Message;
