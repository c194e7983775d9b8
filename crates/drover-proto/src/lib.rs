//! Wire model shared by the drover actor and its clients.
//!
//! Connections carry newline-delimited JSON frames. Each frame is a
//! [`Message`]: a peer-chosen [`Band`] plus a [`Payload`]. Many logical
//! request/response streams share one connection by using distinct bands.
//!
//! ```json
//! {"band":7,"payload":{"kind":"invoke","event":"ping"}}
//! {"band":7,"payload":{"kind":"chunk","data":[112,111,110,103]}}
//! {"band":7,"payload":{"kind":"choke"}}
//! ```

mod codec;
mod message;

pub use codec::{FrameDecoder, FrameError, MAX_FRAME_BYTES, encode};
pub use message::{Band, Message, Payload};
