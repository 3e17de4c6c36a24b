use burrow_protocol_core::DispatchPolicy;
use serde::Deserialize;

/// Per-connection settings shared by both roles.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub disconnect_on_unknown_packet: bool,
    #[serde(default)]
    pub disconnect_on_invalid_packet: bool,
    /// Network id of the shield item, whose item instances carry an extra
    /// blocking tick field.
    #[serde(default)]
    pub shield_item_id: i32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    /// Cap the length of length-prefixed fields the reader accepts.
    #[serde(default)]
    pub enable_limits: bool,
    #[serde(default)]
    pub texture_packs_required: bool,
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: u16,
}

fn default_chunk_size() -> u32 {
    128 * 1024
}

fn default_compression_threshold() -> u16 {
    256
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            disconnect_on_unknown_packet: false,
            disconnect_on_invalid_packet: false,
            shield_item_id: 0,
            chunk_size: default_chunk_size(),
            enable_limits: false,
            texture_packs_required: false,
            compression_threshold: default_compression_threshold(),
        }
    }
}

impl SessionConfig {
    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            disconnect_on_unknown_packet: self.disconnect_on_unknown_packet,
            disconnect_on_invalid_packet: self.disconnect_on_invalid_packet,
            shield_item_id: self.shield_item_id,
            enable_limits: self.enable_limits,
        }
    }
}
