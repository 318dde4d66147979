//! Sync and awareness messages

use crate::error::{ProtocolError, ProtocolResult};
use crate::varint::{read_var_buf, var_uint_len, write_var_buf};
use bytes::{BufMut, Bytes, BytesMut};

/// Top-level message type: document synchronization
pub const MSG_SYNC: u8 = 0;
/// Top-level message type: presence broadcast
pub const MSG_AWARENESS: u8 = 1;

pub const SYNC_STEP1: u8 = 0;
pub const SYNC_STEP2: u8 = 1;
pub const SYNC_UPDATE: u8 = 2;

/// Encoded update that carries no change
pub const EMPTY_UPDATE: [u8; 2] = [0, 0];

/// Whether `update` is the no-op update
pub fn is_empty_update(update: &[u8]) -> bool {
    update == EMPTY_UPDATE
}

/// One step of the sync handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMessage {
    /// Request for missing changes, carrying the sender's state vector
    Step1(Bytes),
    /// Reply to a STEP1, carrying the update the requester is missing
    Step2(Bytes),
    /// Live update for a local change
    Update(Bytes),
}

impl SyncMessage {
    pub fn step1(state_vector: impl Into<Bytes>) -> Self {
        SyncMessage::Step1(state_vector.into())
    }

    pub fn step2(update: impl Into<Bytes>) -> Self {
        SyncMessage::Step2(update.into())
    }

    pub fn update(update: impl Into<Bytes>) -> Self {
        SyncMessage::Update(update.into())
    }

    pub fn name(&self) -> &'static str {
        match self {
            SyncMessage::Step1(_) => "STEP1",
            SyncMessage::Step2(_) => "STEP2",
            SyncMessage::Update(_) => "UPDATE",
        }
    }

    pub fn payload(&self) -> &Bytes {
        match self {
            SyncMessage::Step1(p) | SyncMessage::Step2(p) | SyncMessage::Update(p) => p,
        }
    }

    fn step(&self) -> u8 {
        match self {
            SyncMessage::Step1(_) => SYNC_STEP1,
            SyncMessage::Step2(_) => SYNC_STEP2,
            SyncMessage::Update(_) => SYNC_UPDATE,
        }
    }

    /// Encode as a complete SYNC message
    pub fn encode(&self) -> Bytes {
        let payload = self.payload();
        let mut buf = BytesMut::with_capacity(2 + var_uint_len(payload.len() as u64) + payload.len());
        buf.put_u8(MSG_SYNC);
        buf.put_u8(self.step());
        write_var_buf(&mut buf, payload);
        buf.freeze()
    }

    /// Decode the body of a SYNC message (everything after the type byte)
    pub fn decode(body: &[u8]) -> ProtocolResult<Self> {
        let (&step, rest) = body
            .split_first()
            .ok_or(ProtocolError::UnexpectedEof("sync message type"))?;
        let (payload, _) = read_var_buf(rest)?;
        let payload = Bytes::copy_from_slice(payload);

        match step {
            SYNC_STEP1 => Ok(SyncMessage::Step1(payload)),
            SYNC_STEP2 => Ok(SyncMessage::Step2(payload)),
            SYNC_UPDATE => Ok(SyncMessage::Update(payload)),
            other => Err(ProtocolError::UnknownSyncType(other)),
        }
    }
}

/// A message addressed to one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Sync(SyncMessage),
    /// Awareness body, kept opaque
    Awareness(Bytes),
}

impl Message {
    pub fn encode(&self) -> Bytes {
        match self {
            Message::Sync(sync) => sync.encode(),
            Message::Awareness(body) => {
                let mut buf = BytesMut::with_capacity(1 + body.len());
                buf.put_u8(MSG_AWARENESS);
                buf.put_slice(body);
                buf.freeze()
            }
        }
    }

    pub fn decode(data: &[u8]) -> ProtocolResult<Self> {
        let (&kind, body) = data.split_first().ok_or(ProtocolError::EmptyMessage)?;

        match kind {
            MSG_SYNC => Ok(Message::Sync(SyncMessage::decode(body)?)),
            MSG_AWARENESS => Ok(Message::Awareness(Bytes::copy_from_slice(body))),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

impl From<SyncMessage> for Message {
    fn from(sync: SyncMessage) -> Self {
        Message::Sync(sync)
    }
}
