use anyhow::Context;
use burrow_types::PackId;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// A resource pack as seen by the transfer code: an identity plus random
/// access to its archive bytes. Archive contents are never inspected here.
pub trait Pack: Send + Sync + std::fmt::Debug {
    fn uuid(&self) -> Uuid;

    fn version(&self) -> &str;

    fn id(&self) -> PackId {
        PackId::new(self.uuid(), self.version())
    }

    /// Total archive length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy bytes starting at `offset` into `buf`. Returns the number of bytes
    /// copied, which is short only at the end of the archive.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Key the archive is encrypted with, or empty.
    fn content_key(&self) -> &str;

    fn encrypted(&self) -> bool {
        !self.content_key().is_empty()
    }

    /// Where clients may fetch the archive over HTTP instead, or empty.
    fn download_url(&self) -> &str {
        ""
    }

    /// A handle to the same bytes with a different content key.
    fn with_content_key(&self, key: &str) -> Arc<dyn Pack>;

    /// SHA-256 of the full archive.
    fn checksum(&self) -> [u8; 32];

    /// Number of `chunk_size` chunks the archive splits into.
    fn chunk_count(&self, chunk_size: u32) -> u32 {
        match chunk_size {
            0 => 0,
            size => self.len().div_ceil(size as u64) as u32,
        }
    }
}

/// A pack held fully in memory. Cloning shares the underlying bytes.
#[derive(Clone)]
pub struct MemoryPack {
    id: PackId,
    data: Bytes,
    content_key: String,
    download_url: String,
    checksum: [u8; 32],
}

impl MemoryPack {
    pub fn new(id: PackId, data: Bytes) -> Self {
        let checksum = Sha256::digest(&data).into();
        Self {
            id,
            data,
            content_key: String::new(),
            download_url: String::new(),
            checksum,
        }
    }

    pub fn from_path(path: &Path, id: PackId) -> anyhow::Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read pack {}", path.display()))?;
        if data.is_empty() {
            anyhow::bail!("Pack {} is empty", path.display());
        }
        Ok(Self::new(id, Bytes::from(data)))
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = url.into();
        self
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

impl std::fmt::Debug for MemoryPack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPack")
            .field("id", &self.id)
            .field("len", &self.data.len())
            .field("encrypted", &!self.content_key.is_empty())
            .finish()
    }
}

impl Pack for MemoryPack {
    fn uuid(&self) -> Uuid {
        self.id.uuid
    }

    fn version(&self) -> &str {
        &self.id.version
    }

    fn id(&self) -> PackId {
        self.id.clone()
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset out of range"))?;
        if start > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("offset {} past end of {} byte pack", start, self.data.len()),
            ));
        }
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn content_key(&self) -> &str {
        &self.content_key
    }

    fn download_url(&self) -> &str {
        &self.download_url
    }

    fn with_content_key(&self, key: &str) -> Arc<dyn Pack> {
        let mut pack = self.clone();
        pack.content_key = key.to_string();
        Arc::new(pack)
    }

    fn checksum(&self) -> [u8; 32] {
        self.checksum
    }
}

/// SHA-256 of `data`, used to verify downloads.
pub fn checksum(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}
