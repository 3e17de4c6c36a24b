use burrow_protocol_core::*;
use tracing::trace;
use uuid::Uuid;

pub const PROTOCOL_ID: i32 = 712;
pub const GAME_VERSION: &str = "1.21.20";

/// Adapter for revision 712. Behaviour and texture packs travel in separate
/// lists and the server still sends Tick Sync.
pub struct V712Protocol {
    pool: Pool,
}

impl V712Protocol {
    pub fn new() -> Self {
        let (info_id, info) = packet_factory!(id::RESOURCE_PACKS_INFO, LegacyResourcePacksInfo);
        let (stack_id, stack) = packet_factory!(id::RESOURCE_PACK_STACK, LegacyResourcePackStack);
        let (tick_id, tick) = packet_factory!(id::TICK_SYNC, TickSync);
        Self {
            pool: Pool::from_table(&latest_table())
                .with(info_id, info)
                .with(stack_id, stack)
                .with(tick_id, tick),
        }
    }
}

impl Default for V712Protocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for V712Protocol {
    fn id(&self) -> i32 {
        PROTOCOL_ID
    }

    fn version(&self) -> &'static str {
        GAME_VERSION
    }

    fn pool(&self) -> &Pool {
        &self.pool
    }

    fn convert_to_latest(&self, packet: Packet) -> Vec<Packet> {
        match packet {
            Packet::LegacyResourcePacksInfo(pk) => {
                let has_addons = pk.has_addons || !pk.behaviour_packs.is_empty();
                let texture_packs = pk
                    .behaviour_packs
                    .into_iter()
                    .map(|mut pack| {
                        pack.addon_pack = true;
                        pack
                    })
                    .chain(pk.texture_packs)
                    .collect();
                vec![Packet::ResourcePacksInfo(ResourcePacksInfo {
                    texture_pack_required: pk.texture_pack_required,
                    has_addons,
                    has_scripts: pk.has_scripts,
                    world_template_uuid: Uuid::nil(),
                    world_template_version: String::new(),
                    texture_packs,
                })]
            }
            Packet::LegacyResourcePackStack(pk) => {
                let mut texture_packs = pk.behaviour_packs;
                texture_packs.extend(pk.texture_packs);
                vec![Packet::ResourcePackStack(ResourcePackStack {
                    texture_pack_required: pk.texture_pack_required,
                    texture_packs,
                    base_game_version: pk.base_game_version,
                    experiments: pk.experiments,
                    experiments_previously_toggled: pk.experiments_previously_toggled,
                    include_editor_packs: false,
                })]
            }
            Packet::TickSync(_) => {
                trace!("Dropping TickSync from revision {}", PROTOCOL_ID);
                Vec::new()
            }
            other => vec![other],
        }
    }

    fn convert_from_latest(&self, packet: Packet) -> Vec<Packet> {
        match packet {
            Packet::ResourcePacksInfo(pk) => {
                let (behaviour_packs, texture_packs) =
                    pk.texture_packs.into_iter().partition(|pack| pack.addon_pack);
                vec![Packet::LegacyResourcePacksInfo(LegacyResourcePacksInfo {
                    texture_pack_required: pk.texture_pack_required,
                    has_addons: pk.has_addons,
                    has_scripts: pk.has_scripts,
                    forcing_server_packs: false,
                    behaviour_packs,
                    texture_packs,
                })]
            }
            // The latest stack no longer says which entries are behaviour
            // packs, so everything is listed as a texture pack.
            Packet::ResourcePackStack(pk) => {
                vec![Packet::LegacyResourcePackStack(LegacyResourcePackStack {
                    texture_pack_required: pk.texture_pack_required,
                    behaviour_packs: Vec::new(),
                    texture_packs: pk.texture_packs,
                    base_game_version: pk.base_game_version,
                    experiments: pk.experiments,
                    experiments_previously_toggled: pk.experiments_previously_toggled,
                })]
            }
            other => vec![other],
        }
    }
}
