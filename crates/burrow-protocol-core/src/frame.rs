use crate::adapter::Protocol;
use crate::codec::{CodecError, CodecResult, Marshal};
use crate::header::{Header, HeaderError};
use crate::packets::Packet;
use crate::pool::Pool;
use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Per-connection decode settings: what to do with packets that cannot be
/// decoded cleanly, plus the reader options threaded into every decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub disconnect_on_unknown_packet: bool,
    pub disconnect_on_invalid_packet: bool,
    pub shield_item_id: i32,
    pub enable_limits: bool,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected packet (ID={0})")]
    UnknownPacket(u32),
    #[error("decode packet {name} (ID={id}): {source}")]
    Malformed {
        name: &'static str,
        id: u32,
        #[source]
        source: CodecError,
    },
    #[error("decode packet {name} (ID={id}): {remaining} unread bytes left")]
    TrailingBytes {
        name: &'static str,
        id: u32,
        remaining: usize,
    },
}

impl DecodeError {
    /// Whether the connection must be closed under `policy`.
    pub fn should_disconnect(&self, policy: &DispatchPolicy) -> bool {
        match self {
            DecodeError::UnknownPacket(_) => policy.disconnect_on_unknown_packet,
            DecodeError::Malformed { .. } | DecodeError::TrailingBytes { .. } => {
                policy.disconnect_on_invalid_packet
            }
        }
    }
}

/// Result of a decode that produced packets. `error` is set when the packet
/// was usable but not clean, e.g. left bytes unread under a permissive policy.
#[derive(Debug)]
pub struct Decoded {
    pub packets: Vec<Packet>,
    pub error: Option<DecodeError>,
}

/// Called with the header and raw payload of every packet as it is parsed.
pub type PacketObserver<'a> = &'a mut dyn FnMut(&Header, &[u8]);

/// One raw packet split into header and payload, not yet decoded.
#[derive(Debug, Clone)]
pub struct PacketData {
    pub header: Header,
    payload: Bytes,
}

impl PacketData {
    /// Read the header off a raw packet. A failure only affects this packet;
    /// the caller drops it and keeps reading the stream.
    pub fn parse(data: Bytes) -> Result<Self, HeaderError> {
        Self::parse_with(data, None)
    }

    /// Like `parse`, also handing the header and payload to `observer` before
    /// anything is decoded.
    pub fn parse_with(
        data: Bytes,
        observer: Option<PacketObserver<'_>>,
    ) -> Result<Self, HeaderError> {
        let mut payload = data;
        let header = Header::read(&mut payload)?;
        if let Some(observe) = observer {
            observe(&header, &payload);
        }
        Ok(Self { header, payload })
    }

    /// Decode the payload into packets of the latest revision.
    ///
    /// Any failure while reading fields is converted into
    /// `DecodeError::Malformed` here, so individual packet layouts may simply
    /// propagate codec errors with `?`.
    pub fn decode(
        self,
        pool: &Pool,
        protocol: &dyn Protocol,
        policy: &DispatchPolicy,
    ) -> Result<Decoded, DecodeError> {
        let id = self.header.packet_id;
        let mut packet = match pool.get(id) {
            Some(packet) => packet,
            None => {
                if policy.disconnect_on_unknown_packet {
                    return Err(DecodeError::UnknownPacket(id));
                }
                Packet::Unknown {
                    packet_id: id,
                    payload: Vec::new(),
                }
            }
        };

        let mut payload = self.payload;
        let mut reader =
            protocol.new_reader(&mut payload, policy.shield_item_id, policy.enable_limits);
        packet
            .marshal(&mut reader)
            .map_err(|source| DecodeError::Malformed {
                name: packet.name(),
                id,
                source,
            })?;

        let remaining = reader.remaining();
        if remaining != 0 {
            let err = DecodeError::TrailingBytes {
                name: packet.name(),
                id,
                remaining,
            };
            if policy.disconnect_on_invalid_packet {
                return Err(err);
            }
            return Ok(Decoded {
                packets: protocol.convert_to_latest(packet),
                error: Some(err),
            });
        }
        Ok(Decoded {
            packets: protocol.convert_to_latest(packet),
            error: None,
        })
    }
}

/// Encode a packet, header included, using `protocol`'s writer.
pub fn encode_packet(
    protocol: &dyn Protocol,
    header: Header,
    packet: &mut Packet,
    shield_id: i32,
) -> CodecResult<BytesMut> {
    let mut buf = BytesMut::new();
    header.write(&mut buf);
    packet.marshal(&mut protocol.new_writer(&mut buf, shield_id))?;
    Ok(buf)
}
