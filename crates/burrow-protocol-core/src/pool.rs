use crate::packets::*;
use std::collections::HashMap;

/// Produces a zero-valued packet ready to be filled by a reader.
pub type PacketFactory = fn() -> Packet;

/// Maps the packet ids of one protocol revision to their factories. Built once
/// when the adapter is constructed and only read afterwards.
#[derive(Clone, Default)]
pub struct Pool {
    factories: HashMap<u32, PacketFactory>,
}

impl Pool {
    pub fn from_table(table: &[(u32, PacketFactory)]) -> Self {
        Self {
            factories: table.iter().copied().collect(),
        }
    }

    /// Construct a fresh packet for `id`, or `None` if the revision has no
    /// packet with that id.
    pub fn get(&self, id: u32) -> Option<Packet> {
        self.factories.get(&id).map(|factory| factory())
    }

    pub fn contains(&self, id: u32) -> bool {
        self.factories.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Replace or add the factory for `id`.
    pub fn with(mut self, id: u32, factory: PacketFactory) -> Self {
        self.factories.insert(id, factory);
        self
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.factories.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("Pool").field("ids", &ids).finish()
    }
}

/// Build a `(id, factory)` entry for a pool table from a `Packet` variant
/// whose payload implements `Default`.
#[macro_export]
macro_rules! packet_factory {
    ($id:expr, $variant:ident) => {
        (
            $id,
            (|| $crate::packets::Packet::$variant(Default::default())) as $crate::pool::PacketFactory,
        )
    };
}

/// Packets of the latest revision.
pub fn latest_table() -> Vec<(u32, PacketFactory)> {
    vec![
        packet_factory!(id::PLAY_STATUS, PlayStatus),
        packet_factory!(id::DISCONNECT, Disconnect),
        packet_factory!(id::RESOURCE_PACKS_INFO, ResourcePacksInfo),
        packet_factory!(id::RESOURCE_PACK_STACK, ResourcePackStack),
        packet_factory!(id::RESOURCE_PACK_CLIENT_RESPONSE, ResourcePackClientResponse),
        packet_factory!(id::MOB_EQUIPMENT, MobEquipment),
        packet_factory!(id::RESOURCE_PACK_DATA_INFO, ResourcePackDataInfo),
        packet_factory!(id::RESOURCE_PACK_CHUNK_DATA, ResourcePackChunkData),
        packet_factory!(id::RESOURCE_PACK_CHUNK_REQUEST, ResourcePackChunkRequest),
        packet_factory!(id::NETWORK_SETTINGS, NetworkSettings),
        packet_factory!(id::REQUEST_NETWORK_SETTINGS, RequestNetworkSettings),
    ]
}
