use crate::codec::{optional, seq, string_seq, CodecResult, LenPrefix, Marshal, PacketIo};
use uuid::Uuid;

/// Packet ids of the latest revision. Older revisions reuse these unless
/// their adapter says otherwise.
pub mod id {
    pub const PLAY_STATUS: u32 = 0x02;
    pub const DISCONNECT: u32 = 0x05;
    pub const RESOURCE_PACKS_INFO: u32 = 0x06;
    pub const RESOURCE_PACK_STACK: u32 = 0x07;
    pub const RESOURCE_PACK_CLIENT_RESPONSE: u32 = 0x08;
    pub const TICK_SYNC: u32 = 0x17;
    pub const MOB_EQUIPMENT: u32 = 0x1F;
    pub const RESOURCE_PACK_DATA_INFO: u32 = 0x52;
    pub const RESOURCE_PACK_CHUNK_DATA: u32 = 0x53;
    pub const RESOURCE_PACK_CHUNK_REQUEST: u32 = 0x54;
    pub const NETWORK_SETTINGS: u32 = 0x8F;
    pub const REQUEST_NETWORK_SETTINGS: u32 = 0xC1;
}

/// Version-independent packet set. Every revision's pool maps its numeric ids
/// onto these variants; variants prefixed `Legacy` only appear in older pools
/// and are rewritten by their adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    RequestNetworkSettings(RequestNetworkSettings),
    NetworkSettings(NetworkSettings),
    PlayStatus(PlayStatus),
    Disconnect(Disconnect),
    ResourcePacksInfo(ResourcePacksInfo),
    ResourcePackStack(ResourcePackStack),
    ResourcePackClientResponse(ResourcePackClientResponse),
    ResourcePackDataInfo(ResourcePackDataInfo),
    ResourcePackChunkRequest(ResourcePackChunkRequest),
    ResourcePackChunkData(ResourcePackChunkData),
    MobEquipment(MobEquipment),

    LegacyResourcePacksInfo(LegacyResourcePacksInfo),
    LegacyResourcePackStack(LegacyResourcePackStack),
    TickSync(TickSync),

    /// Placeholder for an id missing from the pool. The payload is kept
    /// verbatim so it can be forwarded or inspected.
    Unknown { packet_id: u32, payload: Vec<u8> },
}

impl Packet {
    pub fn id(&self) -> u32 {
        match self {
            Packet::RequestNetworkSettings(_) => id::REQUEST_NETWORK_SETTINGS,
            Packet::NetworkSettings(_) => id::NETWORK_SETTINGS,
            Packet::PlayStatus(_) => id::PLAY_STATUS,
            Packet::Disconnect(_) => id::DISCONNECT,
            Packet::ResourcePacksInfo(_) | Packet::LegacyResourcePacksInfo(_) => {
                id::RESOURCE_PACKS_INFO
            }
            Packet::ResourcePackStack(_) | Packet::LegacyResourcePackStack(_) => {
                id::RESOURCE_PACK_STACK
            }
            Packet::ResourcePackClientResponse(_) => id::RESOURCE_PACK_CLIENT_RESPONSE,
            Packet::ResourcePackDataInfo(_) => id::RESOURCE_PACK_DATA_INFO,
            Packet::ResourcePackChunkRequest(_) => id::RESOURCE_PACK_CHUNK_REQUEST,
            Packet::ResourcePackChunkData(_) => id::RESOURCE_PACK_CHUNK_DATA,
            Packet::MobEquipment(_) => id::MOB_EQUIPMENT,
            Packet::TickSync(_) => id::TICK_SYNC,
            Packet::Unknown { packet_id, .. } => *packet_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Packet::RequestNetworkSettings(_) => "RequestNetworkSettings",
            Packet::NetworkSettings(_) => "NetworkSettings",
            Packet::PlayStatus(_) => "PlayStatus",
            Packet::Disconnect(_) => "Disconnect",
            Packet::ResourcePacksInfo(_) => "ResourcePacksInfo",
            Packet::ResourcePackStack(_) => "ResourcePackStack",
            Packet::ResourcePackClientResponse(_) => "ResourcePackClientResponse",
            Packet::ResourcePackDataInfo(_) => "ResourcePackDataInfo",
            Packet::ResourcePackChunkRequest(_) => "ResourcePackChunkRequest",
            Packet::ResourcePackChunkData(_) => "ResourcePackChunkData",
            Packet::MobEquipment(_) => "MobEquipment",
            Packet::LegacyResourcePacksInfo(_) => "LegacyResourcePacksInfo",
            Packet::LegacyResourcePackStack(_) => "LegacyResourcePackStack",
            Packet::TickSync(_) => "TickSync",
            Packet::Unknown { .. } => "Unknown",
        }
    }
}

impl Marshal for Packet {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        match self {
            Packet::RequestNetworkSettings(p) => p.marshal(io),
            Packet::NetworkSettings(p) => p.marshal(io),
            Packet::PlayStatus(p) => p.marshal(io),
            Packet::Disconnect(p) => p.marshal(io),
            Packet::ResourcePacksInfo(p) => p.marshal(io),
            Packet::ResourcePackStack(p) => p.marshal(io),
            Packet::ResourcePackClientResponse(p) => p.marshal(io),
            Packet::ResourcePackDataInfo(p) => p.marshal(io),
            Packet::ResourcePackChunkRequest(p) => p.marshal(io),
            Packet::ResourcePackChunkData(p) => p.marshal(io),
            Packet::MobEquipment(p) => p.marshal(io),
            Packet::LegacyResourcePacksInfo(p) => p.marshal(io),
            Packet::LegacyResourcePackStack(p) => p.marshal(io),
            Packet::TickSync(p) => p.marshal(io),
            Packet::Unknown { payload, .. } => io.remaining_bytes(payload),
        }
    }
}

// === Session setup ===

/// Request Network Settings (0xC1 serverbound). The first packet a client
/// sends; its protocol id selects the adapter for the rest of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestNetworkSettings {
    pub client_protocol: i32,
}

impl Marshal for RequestNetworkSettings {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.be_i32(&mut self.client_protocol)
    }
}

pub const COMPRESSION_FLATE: u16 = 0;
pub const COMPRESSION_NONE: u16 = 0xFFFF;

/// Network Settings (0x8F clientbound).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkSettings {
    pub compression_threshold: u16,
    pub compression_algorithm: u16,
    pub client_throttle: bool,
    pub client_throttle_threshold: u8,
    pub client_throttle_scalar: f32,
}

impl Marshal for NetworkSettings {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.u16(&mut self.compression_threshold)?;
        io.u16(&mut self.compression_algorithm)?;
        io.bool(&mut self.client_throttle)?;
        io.u8(&mut self.client_throttle_threshold)?;
        io.f32(&mut self.client_throttle_scalar)
    }
}

pub const PLAY_STATUS_LOGIN_SUCCESS: i32 = 0;
pub const PLAY_STATUS_LOGIN_FAILED_CLIENT: i32 = 1;
pub const PLAY_STATUS_LOGIN_FAILED_SERVER: i32 = 2;
pub const PLAY_STATUS_PLAYER_SPAWN: i32 = 3;

/// Play Status (0x02 clientbound)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayStatus {
    pub status: i32,
}

impl Marshal for PlayStatus {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.be_i32(&mut self.status)
    }
}

/// Disconnect (0x05, both directions). Messages are only present when the
/// disconnection screen is shown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Disconnect {
    pub reason: i32,
    pub hide_disconnection_screen: bool,
    pub message: String,
    pub filtered_message: String,
}

impl Marshal for Disconnect {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.varint32(&mut self.reason)?;
        io.bool(&mut self.hide_disconnection_screen)?;
        if !self.hide_disconnection_screen {
            io.string(&mut self.message)?;
            io.string(&mut self.filtered_message)?;
        }
        Ok(())
    }
}

// === Resource packs ===

/// Catalog entry describing one pack the server wants the client to have.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TexturePackInfo {
    pub uuid: Uuid,
    pub version: String,
    pub size: u64,
    pub content_key: String,
    pub sub_pack_name: String,
    pub content_identity: String,
    pub has_scripts: bool,
    pub addon_pack: bool,
    pub rtx_enabled: bool,
    pub download_url: String,
}

impl Marshal for TexturePackInfo {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.uuid(&mut self.uuid)?;
        io.string(&mut self.version)?;
        io.u64(&mut self.size)?;
        io.string(&mut self.content_key)?;
        io.string(&mut self.sub_pack_name)?;
        io.string(&mut self.content_identity)?;
        io.bool(&mut self.has_scripts)?;
        io.bool(&mut self.addon_pack)?;
        io.bool(&mut self.rtx_enabled)?;
        io.string(&mut self.download_url)
    }
}

/// Resource Packs Info (0x06 clientbound): the pack catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePacksInfo {
    pub texture_pack_required: bool,
    pub has_addons: bool,
    pub has_scripts: bool,
    pub world_template_uuid: Uuid,
    pub world_template_version: String,
    pub texture_packs: Vec<TexturePackInfo>,
}

impl Marshal for ResourcePacksInfo {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.bool(&mut self.texture_pack_required)?;
        io.bool(&mut self.has_addons)?;
        io.bool(&mut self.has_scripts)?;
        io.uuid(&mut self.world_template_uuid)?;
        io.string(&mut self.world_template_version)?;
        seq(io, LenPrefix::U16, &mut self.texture_packs)
    }
}

/// Resource Packs Info as sent by revision 712, with behaviour packs listed
/// separately.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyResourcePacksInfo {
    pub texture_pack_required: bool,
    pub has_addons: bool,
    pub has_scripts: bool,
    pub forcing_server_packs: bool,
    pub behaviour_packs: Vec<TexturePackInfo>,
    pub texture_packs: Vec<TexturePackInfo>,
}

impl Marshal for LegacyResourcePacksInfo {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.bool(&mut self.texture_pack_required)?;
        io.bool(&mut self.has_addons)?;
        io.bool(&mut self.has_scripts)?;
        io.bool(&mut self.forcing_server_packs)?;
        seq(io, LenPrefix::U16, &mut self.behaviour_packs)?;
        seq(io, LenPrefix::U16, &mut self.texture_packs)
    }
}

/// One entry of the pack stack, naming a pack by UUID and version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackResourcePack {
    pub uuid: String,
    pub version: String,
    pub sub_pack_name: String,
}

impl Marshal for StackResourcePack {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.string(&mut self.uuid)?;
        io.string(&mut self.version)?;
        io.string(&mut self.sub_pack_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentData {
    pub name: String,
    pub enabled: bool,
}

impl Marshal for ExperimentData {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.string(&mut self.name)?;
        io.bool(&mut self.enabled)
    }
}

/// Resource Pack Stack (0x07 clientbound): the load order of resolved packs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePackStack {
    pub texture_pack_required: bool,
    pub texture_packs: Vec<StackResourcePack>,
    pub base_game_version: String,
    pub experiments: Vec<ExperimentData>,
    pub experiments_previously_toggled: bool,
    pub include_editor_packs: bool,
}

impl Marshal for ResourcePackStack {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.bool(&mut self.texture_pack_required)?;
        seq(io, LenPrefix::VarU32, &mut self.texture_packs)?;
        io.string(&mut self.base_game_version)?;
        seq(io, LenPrefix::U32, &mut self.experiments)?;
        io.bool(&mut self.experiments_previously_toggled)?;
        io.bool(&mut self.include_editor_packs)
    }
}

/// Resource Pack Stack as sent by revision 712.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyResourcePackStack {
    pub texture_pack_required: bool,
    pub behaviour_packs: Vec<StackResourcePack>,
    pub texture_packs: Vec<StackResourcePack>,
    pub base_game_version: String,
    pub experiments: Vec<ExperimentData>,
    pub experiments_previously_toggled: bool,
}

impl Marshal for LegacyResourcePackStack {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.bool(&mut self.texture_pack_required)?;
        seq(io, LenPrefix::VarU32, &mut self.behaviour_packs)?;
        seq(io, LenPrefix::VarU32, &mut self.texture_packs)?;
        io.string(&mut self.base_game_version)?;
        seq(io, LenPrefix::U32, &mut self.experiments)?;
        io.bool(&mut self.experiments_previously_toggled)
    }
}

/// Client answers to the catalog and stack packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PackResponse {
    Refused = 1,
    SendPacks = 2,
    AllPacksDownloaded = 3,
    Completed = 4,
}

impl PackResponse {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(PackResponse::Refused),
            2 => Some(PackResponse::SendPacks),
            3 => Some(PackResponse::AllPacksDownloaded),
            4 => Some(PackResponse::Completed),
            _ => None,
        }
    }
}

/// Resource Pack Client Response (0x08 serverbound). `packs_to_download`
/// holds `uuid_version` tokens.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePackClientResponse {
    pub response: u8,
    pub packs_to_download: Vec<String>,
}

impl ResourcePackClientResponse {
    pub fn new(response: PackResponse) -> Self {
        Self {
            response: response as u8,
            packs_to_download: Vec::new(),
        }
    }
}

impl Marshal for ResourcePackClientResponse {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.u8(&mut self.response)?;
        string_seq(io, LenPrefix::U16, &mut self.packs_to_download)
    }
}

pub const PACK_TYPE_RESOURCES: u8 = 6;

/// Resource Pack Data Info (0x52 clientbound). Starts the transfer of one pack.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePackDataInfo {
    pub uuid: String,
    pub data_chunk_size: u32,
    pub chunk_count: u32,
    pub size: u64,
    /// SHA-256 of the pack content; may be empty.
    pub hash: Vec<u8>,
    pub premium: bool,
    pub pack_type: u8,
}

impl Marshal for ResourcePackDataInfo {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.string(&mut self.uuid)?;
        io.u32(&mut self.data_chunk_size)?;
        io.u32(&mut self.chunk_count)?;
        io.u64(&mut self.size)?;
        io.byte_slice(&mut self.hash)?;
        io.bool(&mut self.premium)?;
        io.u8(&mut self.pack_type)
    }
}

/// Resource Pack Chunk Request (0x54 serverbound)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePackChunkRequest {
    pub uuid: String,
    pub chunk_index: u32,
}

impl Marshal for ResourcePackChunkRequest {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.string(&mut self.uuid)?;
        io.u32(&mut self.chunk_index)
    }
}

/// Resource Pack Chunk Data (0x53 clientbound)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePackChunkData {
    pub uuid: String,
    pub chunk_index: u32,
    pub data_offset: u64,
    pub data: Vec<u8>,
}

impl Marshal for ResourcePackChunkData {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.string(&mut self.uuid)?;
        io.u32(&mut self.chunk_index)?;
        io.u64(&mut self.data_offset)?;
        io.byte_slice(&mut self.data)
    }
}

// === Gameplay ===

/// An item as carried by inventory packets. A zero network id is an empty
/// slot and carries no further fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemInstance {
    pub network_id: i32,
    pub count: u16,
    pub metadata: u32,
    pub stack_network_id: Option<i32>,
    pub block_runtime_id: i32,
    pub can_be_placed_on: Vec<String>,
    pub can_break: Vec<String>,
    /// Only present on the wire for the shield item.
    pub blocking_tick: i64,
}

impl Marshal for ItemInstance {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.varint32(&mut self.network_id)?;
        if self.network_id == 0 {
            return Ok(());
        }
        io.u16(&mut self.count)?;
        io.varu32(&mut self.metadata)?;
        optional(io, &mut self.stack_network_id, |io, v| io.varint32(v))?;
        io.varint32(&mut self.block_runtime_id)?;
        string_seq(io, LenPrefix::U32, &mut self.can_be_placed_on)?;
        string_seq(io, LenPrefix::U32, &mut self.can_break)?;
        if self.network_id == io.shield_id() {
            io.i64(&mut self.blocking_tick)?;
        }
        Ok(())
    }
}

/// Mob Equipment (0x1F, both directions)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MobEquipment {
    pub entity_runtime_id: u64,
    pub new_item: ItemInstance,
    pub inventory_slot: u8,
    pub hotbar_slot: u8,
    pub window_id: u8,
}

impl Marshal for MobEquipment {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.varu64(&mut self.entity_runtime_id)?;
        self.new_item.marshal(io)?;
        io.u8(&mut self.inventory_slot)?;
        io.u8(&mut self.hotbar_slot)?;
        io.u8(&mut self.window_id)
    }
}

/// Tick Sync (0x17, revision 712 only)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSync {
    pub client_request_timestamp: i64,
    pub server_reception_timestamp: i64,
}

impl Marshal for TickSync {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()> {
        io.i64(&mut self.client_request_timestamp)?;
        io.i64(&mut self.server_reception_timestamp)
    }
}
