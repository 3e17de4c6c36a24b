use thiserror::Error;
use uuid::Uuid;

/// Failures of the resource pack exchange.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("invalid pack reference {0:?}")]
    InvalidPackId(String),
    #[error("no pack {0} is being downloaded")]
    UnknownPack(Uuid),
    #[error("pack {pack} has no content and can never be resolved")]
    EmptyPack { pack: Uuid },
    #[error("pack {pack} announced a chunk size of zero")]
    ZeroChunkSize { pack: Uuid },
    #[error("pack {pack} chunk data had chunk index {got}, but expected {expected}")]
    ChunkIndexMismatch { pack: Uuid, expected: u32, got: u32 },
    #[error("pack {pack} chunk data had a length of {got}, but expected {expected}")]
    ChunkSizeMismatch { pack: Uuid, expected: u32, got: usize },
    #[error("pack {pack} chunk data would exceed the declared size of {size} bytes")]
    Overflow { pack: Uuid, size: u64 },
    #[error("pack {pack} chunk {index} arrived before it was requested")]
    UnrequestedChunk { pack: Uuid, index: u32 },
    #[error("texture pack {{uuid={uuid}, version={version}}} not downloaded")]
    MissingStackEntry { uuid: String, version: String },
    #[error("client refused the resource packs")]
    Refused,
    #[error("unexpected resource pack client response {0}")]
    UnexpectedResponse(u8),
    #[error("client requested unknown pack {0:?}")]
    UnknownRequestedPack(String),
    #[error("client asked for packs but named none")]
    NothingRequested,
    #[error("chunk request had unexpected pack: expected {expected}, but got {got:?}")]
    UnexpectedPack { expected: Uuid, got: String },
    #[error("chunk request had unexpected chunk index: expected {expected}, but got {got}")]
    UnexpectedChunkIndex { expected: u32, got: u32 },
    #[error("chunk request while no pack is being served")]
    NotServing,
    #[error("reading pack chunk: {0}")]
    Store(#[from] std::io::Error),
}

impl TransferError {
    /// Whether the error ends the whole session. Errors about a single
    /// download only abandon that pack.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            TransferError::InvalidPackId(_)
                | TransferError::UnknownPack(_)
                | TransferError::ZeroChunkSize { .. }
                | TransferError::ChunkIndexMismatch { .. }
                | TransferError::ChunkSizeMismatch { .. }
                | TransferError::Overflow { .. }
                | TransferError::UnrequestedChunk { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_errors_are_local() {
        let pack = Uuid::from_u128(1);
        assert!(!TransferError::ChunkIndexMismatch { pack, expected: 1, got: 2 }.is_fatal());
        assert!(!TransferError::UnknownPack(pack).is_fatal());
        assert!(TransferError::Refused.is_fatal());
        assert!(TransferError::EmptyPack { pack }.is_fatal());
        assert!(TransferError::MissingStackEntry {
            uuid: pack.to_string(),
            version: "1.0.0".into()
        }
        .is_fatal());
    }
}
