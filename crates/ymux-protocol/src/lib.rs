//! ymux wire protocol
//!
//! Several documents share one connection. Every frame starts with the
//! document it belongs to, followed by a y-sync style message.
//!
//! ## Frame Format
//! ```text
//! Frame       = varUint(len(doc_id)) • doc_id • message
//! message     = SYNC(0) • step • varUint(len(payload)) • payload
//!             | AWARENESS(1) • ...
//! step        = STEP1(0) | STEP2(1) | UPDATE(2)
//! ```
//!
//! STEP1 carries a state vector, STEP2 and UPDATE carry an update blob.
//! Both are opaque to this crate.

pub mod decoder;
pub mod error;
pub mod frame;
pub mod message;
pub mod varint;

pub use decoder::FrameDecoder;
pub use error::{ProtocolError, ProtocolResult};
pub use frame::{decode_frame, encode_frame, Frame};
pub use message::{is_empty_update, Message, SyncMessage, EMPTY_UPDATE};
