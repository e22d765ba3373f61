//! P2P protocol messages
//!
//! Defines the message types exchanged between nodes and the frame codec
//! that carries them over TCP.

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::consensus::Block;
use crate::validation::Transaction;

/// Network magic bytes (identifies the Curra network)
pub const NETWORK_MAGIC: [u8; 4] = [0x43, 0x55, 0x52, 0x41]; // "CURA"

/// Maximum payload size (32 MB, a full chain response must fit)
pub const MAX_MESSAGE_SIZE: usize = 32 * 1024 * 1024;

/// Magic (4) + length (4)
const HEADER_LEN: usize = 8;

/// P2P message types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Message {
    /// Ask for the peer's head block
    RequestLatest,
    /// Ask for the peer's whole chain
    RequestAll,
    /// Blocks in ascending index order
    ChainResponse(Vec<Block>),
    /// Ask for the peer's pending transactions
    RequestMempool,
    /// Pending transactions
    MempoolResponse(Vec<Transaction>),
}

impl Message {
    /// Serialize the payload (no framing)
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize a payload produced by [`Message::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Get the command name for this message
    pub fn command(&self) -> &'static str {
        match self {
            Message::RequestLatest => "request_latest",
            Message::RequestAll => "request_all",
            Message::ChainResponse(_) => "chain_response",
            Message::RequestMempool => "request_mempool",
            Message::MempoolResponse(_) => "mempool_response",
        }
    }
}

/// Length-prefixed framing: magic, u32 big-endian length, JSON payload
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageCodec;

impl Encoder<Message> for MessageCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let data = item
            .to_bytes()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if data.len() > MAX_MESSAGE_SIZE {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Message too large"));
        }

        dst.reserve(HEADER_LEN + data.len());
        dst.put_slice(&NETWORK_MAGIC);
        dst.put_u32(data.len() as u32);
        dst.put_slice(&data);
        Ok(())
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        if src[..4] != NETWORK_MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Invalid network magic"));
        }

        let len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Message too large"));
        }

        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let data = src.split_to(len);

        Message::from_bytes(&data)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
