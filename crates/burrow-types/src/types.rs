use serde::Deserialize;
use uuid::Uuid;

/// Protocol revision spoken by the latest adapter.
pub const LATEST_PROTOCOL: i32 = 729;
/// Game version string matching `LATEST_PROTOCOL`.
pub const LATEST_GAME_VERSION: &str = "1.21.30";

/// A resource pack identity: UUID plus version string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct PackId {
    pub uuid: Uuid,
    pub version: String,
}

impl PackId {
    pub fn new(uuid: Uuid, version: impl Into<String>) -> Self {
        Self {
            uuid,
            version: version.into(),
        }
    }

    /// The `uuid_version` token used when naming packs on the wire.
    pub fn composite(&self) -> String {
        format!("{}_{}", self.uuid, self.version)
    }

    /// Parse the UUID out of a pack reference that is either a bare UUID or a
    /// `uuid_version` composite token.
    pub fn parse_uuid(s: &str) -> Result<Uuid, uuid::Error> {
        let head = s.split_once('_').map_or(s, |(uuid, _)| uuid);
        Uuid::parse_str(head)
    }
}

impl std::fmt::Display for PackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{}", self.uuid, self.version)
    }
}

impl std::str::FromStr for PackId {
    type Err = uuid::Error;

    /// Parses the composite `uuid_version` form. A missing version yields an
    /// empty version string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (uuid, version) = s.split_once('_').unwrap_or((s, ""));
        Ok(Self::new(Uuid::parse_str(uuid)?, version))
    }
}

/// A pack the client is assumed to have installed already. Exempted packs are
/// never transferred but may still appear on the pack stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExemptedPack {
    pub uuid: Uuid,
    pub version: &'static str,
}

impl ExemptedPack {
    pub fn matches(&self, uuid: &Uuid, version: &str) -> bool {
        self.uuid == *uuid && self.version == version
    }
}

/// Packs shipped with every client.
pub const EXEMPTED_PACKS: &[ExemptedPack] = &[ExemptedPack {
    uuid: Uuid::from_u128(0x0fba4063_dba1_4281_9b89_ff9390653530),
    version: "1.0.0",
}];

pub fn is_exempted(uuid: &Uuid, version: &str) -> bool {
    EXEMPTED_PACKS.iter().any(|p| p.matches(uuid, version))
}
