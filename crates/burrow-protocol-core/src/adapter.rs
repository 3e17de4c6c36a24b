use crate::codec::{Reader, Writer};
use crate::packets::Packet;
use crate::pool::{latest_table, Pool};
use burrow_types::{LATEST_GAME_VERSION, LATEST_PROTOCOL};
use bytes::{Bytes, BytesMut};

/// Trait for revision-specific protocol adapters.
/// Each supported protocol revision implements this trait.
pub trait Protocol: Send + Sync {
    /// The protocol revision number this adapter handles.
    fn id(&self) -> i32;

    /// Game version string of the revision.
    fn version(&self) -> &'static str;

    /// Packets known to this revision.
    fn pool(&self) -> &Pool;

    fn new_reader<'a>(&self, buf: &'a mut Bytes, shield_id: i32, enable_limits: bool) -> Reader<'a> {
        Reader::new(buf, shield_id, enable_limits)
    }

    fn new_writer<'a>(&self, buf: &'a mut BytesMut, shield_id: i32) -> Writer<'a> {
        Writer::new(buf, shield_id)
    }

    /// Rewrite a packet decoded under this revision into packets of the latest
    /// revision. May yield zero, one or several packets.
    fn convert_to_latest(&self, packet: Packet) -> Vec<Packet>;

    /// Rewrite a latest-revision packet into this revision's packets.
    fn convert_from_latest(&self, packet: Packet) -> Vec<Packet>;
}

/// Adapter for the newest revision. Conversions are the identity.
pub struct LatestProtocol {
    pool: Pool,
}

impl LatestProtocol {
    pub fn new() -> Self {
        Self {
            pool: Pool::from_table(&latest_table()),
        }
    }
}

impl Default for LatestProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for LatestProtocol {
    fn id(&self) -> i32 {
        LATEST_PROTOCOL
    }

    fn version(&self) -> &'static str {
        LATEST_GAME_VERSION
    }

    fn pool(&self) -> &Pool {
        &self.pool
    }

    fn convert_to_latest(&self, packet: Packet) -> Vec<Packet> {
        vec![packet]
    }

    fn convert_from_latest(&self, packet: Packet) -> Vec<Packet> {
        vec![packet]
    }
}
