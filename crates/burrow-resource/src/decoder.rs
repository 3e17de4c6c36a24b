use crate::pack::{MemoryPack, Pack};
use burrow_types::PackId;
use bytes::Bytes;
use std::sync::Arc;

/// Turns the bytes of a completed download into a pack.
pub trait PackDecoder: Send + Sync {
    fn decode(&self, id: &PackId, data: Bytes) -> anyhow::Result<Arc<dyn Pack>>;
}

/// Keeps the downloaded archive as-is, identified by the catalog entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawPackDecoder;

impl PackDecoder for RawPackDecoder {
    fn decode(&self, id: &PackId, data: Bytes) -> anyhow::Result<Arc<dyn Pack>> {
        if data.is_empty() {
            anyhow::bail!("Pack {} has no content", id);
        }
        Ok(Arc::new(MemoryPack::new(id.clone(), data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_raw_decoder() {
        let id = PackId::new(Uuid::from_u128(1), "2.0.0");
        let pack = RawPackDecoder
            .decode(&id, Bytes::from_static(b"archive"))
            .unwrap();
        assert_eq!(pack.id(), id);
        assert_eq!(pack.len(), 7);
        assert!(RawPackDecoder.decode(&id, Bytes::new()).is_err());
    }
}
