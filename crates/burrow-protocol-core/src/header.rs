use crate::codec::{read_varu32, write_varu32, CodecError};
use bytes::{Buf, BufMut};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("truncated packet header: {0}")]
    Truncated(#[from] CodecError),
}

/// The header preceding every packet payload. Packet id and sub-client ids
/// share one VarU32: bits 0-9 hold the id, 10-11 the sender sub-client and
/// 12-13 the target sub-client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    pub packet_id: u32,
    pub sender_sub_client: u8,
    pub target_sub_client: u8,
}

const PACKET_ID_MASK: u32 = 0x3FF;
const SUB_CLIENT_MASK: u32 = 0x03;
const SENDER_SHIFT: u32 = 10;
const TARGET_SHIFT: u32 = 12;

impl Header {
    pub fn new(packet_id: u32) -> Self {
        Self {
            packet_id,
            ..Default::default()
        }
    }

    pub fn read(buf: &mut impl Buf) -> Result<Self, HeaderError> {
        let value = read_varu32(buf)?;
        Ok(Self {
            packet_id: value & PACKET_ID_MASK,
            sender_sub_client: ((value >> SENDER_SHIFT) & SUB_CLIENT_MASK) as u8,
            target_sub_client: ((value >> TARGET_SHIFT) & SUB_CLIENT_MASK) as u8,
        })
    }

    pub fn write(&self, buf: &mut impl BufMut) {
        write_varu32(
            buf,
            (self.packet_id & PACKET_ID_MASK)
                | ((self.sender_sub_client as u32 & SUB_CLIENT_MASK) << SENDER_SHIFT)
                | ((self.target_sub_client as u32 & SUB_CLIENT_MASK) << TARGET_SHIFT),
        );
    }
}
