use crate::error::TransferError;
use crate::session::Outgoing;
use crate::stage::ClientStage;
use burrow_protocol_core::*;
use burrow_resource::{checksum, Pack, PackDecoder};
use burrow_types::{is_exempted, PackId};
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Decides whether a catalog entry is downloaded. Called with the pack, its
/// position in the catalog and the catalog length.
pub type DownloadFilter = Arc<dyn Fn(&PackId, usize, usize) -> bool + Send + Sync>;

/// Catalog entry not yet announced by a data info packet.
#[derive(Debug)]
struct PendingPack {
    id: PackId,
    size: u64,
    content_key: String,
}

/// A pack whose chunks are being received.
#[derive(Debug)]
struct ActivePack {
    id: PackId,
    size: u64,
    chunk_size: u32,
    chunk_count: u32,
    expected_index: u32,
    received: u64,
    fragments: mpsc::Sender<Bytes>,
}

#[derive(Debug, Default)]
struct PackQueue {
    remaining: usize,
    downloading: HashMap<Uuid, PendingPack>,
    awaiting: HashMap<Uuid, ActivePack>,
}

#[derive(Debug)]
struct ClientState {
    stage: ClientStage,
    queue: PackQueue,
    resolved: Vec<Arc<dyn Pack>>,
    ignored: Vec<PackId>,
}

struct ClientShared {
    outbound: mpsc::UnboundedSender<Outgoing>,
    cancel: CancellationToken,
    decoder: Arc<dyn PackDecoder>,
    state: Mutex<ClientState>,
}

impl ClientShared {
    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, packet: Packet) {
        if self.outbound.send(Outgoing::Packet(packet)).is_err() {
            trace!("Writer gone, dropping outgoing packet");
        }
    }
}

/// Everything a download worker needs once its data info has arrived.
struct DownloadJob {
    wire_id: String,
    id: PackId,
    size: u64,
    chunk_count: u32,
    hash: Vec<u8>,
    content_key: String,
}

/// Client side of the resource pack exchange. Network handlers run on the
/// connection's receive task; one worker task per pack pulls its chunks.
pub struct ClientPackHandler {
    shared: Arc<ClientShared>,
    filter: Option<DownloadFilter>,
}

impl ClientPackHandler {
    pub fn new(
        outbound: mpsc::UnboundedSender<Outgoing>,
        cancel: CancellationToken,
        decoder: Arc<dyn PackDecoder>,
    ) -> Self {
        Self {
            shared: Arc::new(ClientShared {
                outbound,
                cancel,
                decoder,
                state: Mutex::new(ClientState {
                    stage: ClientStage::AwaitingNetworkSettings,
                    queue: PackQueue::default(),
                    resolved: Vec::new(),
                    ignored: Vec::new(),
                }),
            }),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: DownloadFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn stage(&self) -> ClientStage {
        self.shared.lock().stage
    }

    /// Packs downloaded and parsed so far.
    pub fn resolved_packs(&self) -> Vec<Arc<dyn Pack>> {
        self.shared.lock().resolved.clone()
    }

    /// Packs still outstanding before the stack is expected.
    pub fn remaining(&self) -> usize {
        self.shared.lock().queue.remaining
    }

    pub fn on_network_settings(&self) {
        let mut state = self.shared.lock();
        if state.stage == ClientStage::AwaitingNetworkSettings {
            state.stage = ClientStage::AwaitingPacksInfo;
        }
    }

    /// Build the download queue from the server's catalog and answer it.
    pub fn handle_packs_info(&self, pk: &ResourcePacksInfo) {
        let total = pk.texture_packs.len();
        let mut queue = PackQueue {
            remaining: total,
            ..Default::default()
        };
        let mut ignored = Vec::new();
        let mut to_download = Vec::with_capacity(total);

        for (index, pack) in pk.texture_packs.iter().enumerate() {
            let id = PackId::new(pack.uuid, pack.version.as_str());
            if queue.downloading.contains_key(&pack.uuid) {
                warn!("Duplicate texture pack {} in resource pack info", id);
                queue.remaining -= 1;
                continue;
            }
            if is_exempted(&pack.uuid, &pack.version) {
                debug!("Skipping exempted pack {}", id);
                queue.remaining -= 1;
                continue;
            }
            if let Some(filter) = &self.filter {
                if !filter(&id, index, total) {
                    debug!("Download filter rejected pack {}", id);
                    ignored.push(id);
                    queue.remaining -= 1;
                    continue;
                }
            }
            to_download.push(id.composite());
            queue.downloading.insert(
                pack.uuid,
                PendingPack {
                    id,
                    size: pack.size,
                    content_key: pack.content_key.clone(),
                },
            );
        }

        let mut state = self.shared.lock();
        state.queue = queue;
        state.ignored = ignored;
        if to_download.is_empty() {
            debug!("No resource packs to download");
            state.stage = ClientStage::AwaitingStack;
            self.shared.send(Packet::ResourcePackClientResponse(
                ResourcePackClientResponse::new(PackResponse::AllPacksDownloaded),
            ));
        } else {
            debug!("Requesting {} resource packs", to_download.len());
            state.stage = ClientStage::Downloading;
            self.shared.send(Packet::ResourcePackClientResponse(ResourcePackClientResponse {
                response: PackResponse::SendPacks as u8,
                packs_to_download: to_download,
            }));
        }
    }

    /// Start downloading the pack described by `pk`.
    pub fn handle_data_info(&self, pk: &ResourcePackDataInfo) -> Result<(), TransferError> {
        let uuid = PackId::parse_uuid(&pk.uuid)
            .map_err(|_| TransferError::InvalidPackId(pk.uuid.clone()))?;

        let mut state = self.shared.lock();
        let pending = state
            .queue
            .downloading
            .remove(&uuid)
            .ok_or(TransferError::UnknownPack(uuid))?;
        if pending.size != pk.size {
            warn!(
                "Pack {} size {} in resource pack info differs from {} in data info",
                pending.id, pending.size, pk.size
            );
        }
        if pk.data_chunk_size == 0 {
            return Err(TransferError::ZeroChunkSize { pack: uuid });
        }
        if pk.size == 0 {
            return Err(TransferError::EmptyPack { pack: uuid });
        }

        // The announced chunk count is not trusted.
        let chunk_count = pk.size.div_ceil(pk.data_chunk_size as u64) as u32;
        let (fragments, rx) = mpsc::channel(1);
        state.queue.awaiting.insert(
            uuid,
            ActivePack {
                id: pending.id.clone(),
                size: pk.size,
                chunk_size: pk.data_chunk_size,
                chunk_count,
                expected_index: 0,
                received: 0,
                fragments,
            },
        );
        drop(state);

        debug!("Downloading pack {} in {} chunks", pending.id, chunk_count);
        let job = DownloadJob {
            wire_id: pk.uuid.clone(),
            id: pending.id,
            size: pk.size,
            chunk_count,
            hash: pk.hash.clone(),
            content_key: pending.content_key,
        };
        tokio::spawn(download(self.shared.clone(), job, rx));
        Ok(())
    }

    /// Hand a received chunk to its pack's worker. Never blocks; a violation
    /// abandons only the affected pack.
    pub fn handle_chunk_data(&self, pk: ResourcePackChunkData) -> Result<(), TransferError> {
        let uuid = PackId::parse_uuid(&pk.uuid)
            .map_err(|_| TransferError::InvalidPackId(pk.uuid.clone()))?;

        let mut state = self.shared.lock();
        let awaiting = &mut state.queue.awaiting;
        let pack = awaiting.get_mut(&uuid).ok_or(TransferError::UnknownPack(uuid))?;

        let len = pk.data.len();
        let last = pack.received + pack.chunk_size as u64 >= pack.size;
        let result = if pk.chunk_index != pack.expected_index {
            Err(TransferError::ChunkIndexMismatch {
                pack: uuid,
                expected: pack.expected_index,
                got: pk.chunk_index,
            })
        } else if !last && len != pack.chunk_size as usize {
            Err(TransferError::ChunkSizeMismatch {
                pack: uuid,
                expected: pack.chunk_size,
                got: len,
            })
        } else if pack.received + len as u64 > pack.size {
            Err(TransferError::Overflow {
                pack: uuid,
                size: pack.size,
            })
        } else {
            match pack.fragments.try_send(Bytes::from(pk.data)) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => Err(TransferError::UnrequestedChunk {
                    pack: uuid,
                    index: pk.chunk_index,
                }),
                Err(TrySendError::Closed(_)) => Err(TransferError::UnknownPack(uuid)),
            }
        };

        match result {
            Ok(()) => {
                pack.expected_index += 1;
                pack.received += len as u64;
                trace!(
                    "Pack {} chunk {}/{} ({} bytes)",
                    pack.id,
                    pk.chunk_index + 1,
                    pack.chunk_count,
                    len
                );
                if pack.expected_index >= pack.chunk_count {
                    // The queued fragment survives the sender being dropped.
                    awaiting.remove(&uuid);
                }
                Ok(())
            }
            Err(e) => {
                // Dropping the sender stops the worker.
                awaiting.remove(&uuid);
                Err(e)
            }
        }
    }

    /// Check the load order against the packs we hold and finish the exchange.
    pub fn handle_stack(&self, pk: &ResourcePackStack) -> Result<(), TransferError> {
        let mut state = self.shared.lock();
        for entry in &pk.texture_packs {
            let found = match PackId::parse_uuid(&entry.uuid) {
                Ok(uuid) => {
                    is_exempted(&uuid, &entry.version)
                        || state
                            .ignored
                            .iter()
                            .any(|id| id.uuid == uuid && id.version == entry.version)
                        || state
                            .resolved
                            .iter()
                            .any(|pack| pack.uuid() == uuid && pack.version() == entry.version)
                }
                Err(_) => false,
            };
            if !found {
                return Err(TransferError::MissingStackEntry {
                    uuid: entry.uuid.clone(),
                    version: entry.version.clone(),
                });
            }
        }
        debug!("Resource pack stack satisfied with {} entries", pk.texture_packs.len());
        state.stage = ClientStage::Done;
        self.shared.send(Packet::ResourcePackClientResponse(
            ResourcePackClientResponse::new(PackResponse::Completed),
        ));
        Ok(())
    }
}

/// Pull every chunk of one pack, strictly one request in flight, then verify
/// and register the result.
async fn download(shared: Arc<ClientShared>, job: DownloadJob, mut fragments: mpsc::Receiver<Bytes>) {
    let mut buf = BytesMut::with_capacity(job.size.min(64 * 1024 * 1024) as usize);
    for index in 0..job.chunk_count {
        if shared.cancel.is_cancelled() {
            return;
        }
        shared.send(Packet::ResourcePackChunkRequest(ResourcePackChunkRequest {
            uuid: job.wire_id.clone(),
            chunk_index: index,
        }));
        tokio::select! {
            _ = shared.cancel.cancelled() => {
                trace!("Download of {} cancelled", job.id);
                return;
            }
            fragment = fragments.recv() => match fragment {
                Some(fragment) => buf.extend_from_slice(&fragment),
                None => {
                    debug!("Download of {} abandoned at chunk {}", job.id, index);
                    return;
                }
            }
        }
    }

    // The final fragment may win the race against cancellation.
    if shared.cancel.is_cancelled() {
        trace!("Download of {} cancelled after its last chunk", job.id);
        return;
    }

    if !job.hash.is_empty() && checksum(&buf)[..] != job.hash[..] {
        warn!("Checksum mismatch for pack {}", job.id);
        return;
    }

    let mut state = shared.lock();
    if buf.len() as u64 != job.size {
        warn!(
            "Incorrect resource pack size for {}: expected {}, got {}",
            job.id,
            job.size,
            buf.len()
        );
        return;
    }
    let pack = match shared.decoder.decode(&job.id, buf.freeze()) {
        Ok(pack) => pack,
        Err(e) => {
            warn!("Invalid full resource pack data for {}: {:#}", job.id, e);
            return;
        }
    };
    state.resolved.push(pack.with_content_key(&job.content_key));
    state.queue.remaining -= 1;
    debug!("Pack {} ready, {} remaining", job.id, state.queue.remaining);
    if state.queue.remaining == 0 {
        state.stage = ClientStage::AwaitingStack;
        shared.send(Packet::ResourcePackClientResponse(ResourcePackClientResponse::new(
            PackResponse::AllPacksDownloaded,
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_resource::RawPackDecoder;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn handler() -> (ClientPackHandler, UnboundedReceiver<Outgoing>, CancellationToken) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handler = ClientPackHandler::new(tx, cancel.clone(), Arc::new(RawPackDecoder));
        (handler, rx, cancel)
    }

    fn entry(n: u128, size: u64) -> TexturePackInfo {
        TexturePackInfo {
            uuid: Uuid::from_u128(n),
            version: "1.0.0".into(),
            size,
            ..Default::default()
        }
    }

    fn data_info(n: u128, size: u64, chunk_size: u32) -> ResourcePackDataInfo {
        ResourcePackDataInfo {
            uuid: PackId::new(Uuid::from_u128(n), "1.0.0").composite(),
            data_chunk_size: chunk_size,
            size,
            ..Default::default()
        }
    }

    fn chunk(n: u128, index: u32, data: Vec<u8>) -> ResourcePackChunkData {
        ResourcePackChunkData {
            uuid: PackId::new(Uuid::from_u128(n), "1.0.0").composite(),
            chunk_index: index,
            data,
            ..Default::default()
        }
    }

    async fn next_packet(rx: &mut UnboundedReceiver<Outgoing>) -> Packet {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(Outgoing::Packet(packet))) => packet,
            other => panic!("expected packet, got {:?}", other),
        }
    }

    fn response(packet: &Packet) -> Option<PackResponse> {
        match packet {
            Packet::ResourcePackClientResponse(r) => PackResponse::from_u8(r.response),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_empty_catalog_finishes_immediately() {
        let (handler, mut rx, _) = handler();
        handler.handle_packs_info(&ResourcePacksInfo::default());
        assert_eq!(response(&next_packet(&mut rx).await), Some(PackResponse::AllPacksDownloaded));
        assert_eq!(handler.stage(), ClientStage::AwaitingStack);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_catalog_requests_composite_ids() {
        let (handler, mut rx, _) = handler();
        handler.handle_packs_info(&ResourcePacksInfo {
            texture_packs: vec![entry(1, 10), entry(1, 10), entry(2, 10)],
            ..Default::default()
        });
        let Packet::ResourcePackClientResponse(r) = next_packet(&mut rx).await else {
            panic!("expected client response");
        };
        assert_eq!(r.response, PackResponse::SendPacks as u8);
        assert_eq!(
            r.packs_to_download,
            vec![
                format!("{}_1.0.0", Uuid::from_u128(1)),
                format!("{}_1.0.0", Uuid::from_u128(2)),
            ]
        );
        assert_eq!(handler.remaining(), 2);
        assert_eq!(handler.stage(), ClientStage::Downloading);
    }

    #[tokio::test]
    async fn test_single_pack_three_chunks() {
        let (handler, mut rx, _) = handler();
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 256) as u8).collect();
        handler.handle_packs_info(&ResourcePacksInfo {
            texture_packs: vec![entry(1, 300_000)],
            ..Default::default()
        });
        next_packet(&mut rx).await;

        let mut info = data_info(1, 300_000, 131_072);
        info.hash = checksum(&data).to_vec();
        handler.handle_data_info(&info).unwrap();

        let mut lengths = Vec::new();
        for index in 0..3u32 {
            let Packet::ResourcePackChunkRequest(req) = next_packet(&mut rx).await else {
                panic!("expected chunk request");
            };
            assert_eq!(req.chunk_index, index);
            let start = index as usize * 131_072;
            let end = (start + 131_072).min(data.len());
            lengths.push(end - start);
            handler
                .handle_chunk_data(chunk(1, index, data[start..end].to_vec()))
                .unwrap();
        }
        assert_eq!(lengths, [131_072, 131_072, 37_856]);

        assert_eq!(response(&next_packet(&mut rx).await), Some(PackResponse::AllPacksDownloaded));
        assert_eq!(handler.remaining(), 0);
        assert_eq!(handler.stage(), ClientStage::AwaitingStack);
        let packs = handler.resolved_packs();
        assert_eq!(packs.len(), 1);
        assert_eq!(packs[0].len(), 300_000);
    }

    #[tokio::test]
    async fn test_index_mismatch_only_fails_that_pack() {
        let (handler, mut rx, _) = handler();
        handler.handle_packs_info(&ResourcePacksInfo {
            texture_packs: vec![entry(1, 8), entry(2, 4)],
            ..Default::default()
        });
        next_packet(&mut rx).await;
        handler.handle_data_info(&data_info(1, 8, 4)).unwrap();
        handler.handle_data_info(&data_info(2, 4, 4)).unwrap();
        next_packet(&mut rx).await;
        next_packet(&mut rx).await;

        let err = handler.handle_chunk_data(chunk(1, 1, vec![0; 4])).unwrap_err();
        assert!(matches!(err, TransferError::ChunkIndexMismatch { expected: 0, got: 1, .. }));
        assert!(!err.is_fatal());
        assert!(matches!(
            handler.handle_chunk_data(chunk(1, 0, vec![0; 4])),
            Err(TransferError::UnknownPack(_))
        ));

        handler.handle_chunk_data(chunk(2, 0, vec![9; 4])).unwrap();
        wait_for_resolved(&handler, 1).await;
        assert_eq!(handler.resolved_packs()[0].uuid(), Uuid::from_u128(2));
        assert_eq!(handler.remaining(), 1);
        assert_eq!(handler.stage(), ClientStage::Downloading);
    }

    #[tokio::test]
    async fn test_duplicate_final_fragment_does_not_double_count() {
        let (handler, mut rx, _) = handler();
        handler.handle_packs_info(&ResourcePacksInfo {
            texture_packs: vec![entry(1, 3)],
            ..Default::default()
        });
        next_packet(&mut rx).await;
        handler.handle_data_info(&data_info(1, 3, 4)).unwrap();
        next_packet(&mut rx).await;

        handler.handle_chunk_data(chunk(1, 0, vec![1, 2, 3])).unwrap();
        assert!(handler.handle_chunk_data(chunk(1, 0, vec![1, 2, 3])).is_err());

        assert_eq!(response(&next_packet(&mut rx).await), Some(PackResponse::AllPacksDownloaded));
        assert_eq!(handler.resolved_packs().len(), 1);
        assert_eq!(handler.remaining(), 0);
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_chunk_violations() {
        let (handler, mut rx, _) = handler();
        handler.handle_packs_info(&ResourcePacksInfo {
            texture_packs: vec![entry(1, 10), entry(2, 10), entry(3, 10), entry(4, 10)],
            ..Default::default()
        });
        next_packet(&mut rx).await;

        assert!(matches!(
            handler.handle_data_info(&data_info(1, 10, 0)),
            Err(TransferError::ZeroChunkSize { .. })
        ));
        assert!(matches!(
            handler.handle_data_info(&data_info(9, 10, 4)),
            Err(TransferError::UnknownPack(_))
        ));

        handler.handle_data_info(&data_info(2, 10, 4)).unwrap();
        handler.handle_data_info(&data_info(3, 10, 4)).unwrap();
        handler.handle_data_info(&data_info(4, 10, 8)).unwrap();

        // Short chunk that is not the last one.
        assert!(matches!(
            handler.handle_chunk_data(chunk(2, 0, vec![0; 3])),
            Err(TransferError::ChunkSizeMismatch { expected: 4, got: 3, .. })
        ));

        // Second chunk delivered before the worker took the first.
        handler.handle_chunk_data(chunk(3, 0, vec![0; 4])).unwrap();
        assert!(matches!(
            handler.handle_chunk_data(chunk(3, 1, vec![0; 4])),
            Err(TransferError::UnrequestedChunk { index: 1, .. })
        ));

        // Final chunk larger than what is left of the pack.
        handler.handle_chunk_data(chunk(4, 0, vec![0; 8])).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(matches!(
            handler.handle_chunk_data(chunk(4, 1, vec![0; 8])),
            Err(TransferError::Overflow { size: 10, .. })
        ));
        assert_eq!(handler.remaining(), 4);
    }

    async fn wait_for_resolved(handler: &ClientPackHandler, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while handler.resolved_packs().len() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_data_info_size_wins_over_catalog() {
        let (handler, mut rx, _) = handler();
        handler.handle_packs_info(&ResourcePacksInfo {
            texture_packs: vec![entry(2, 5)],
            ..Default::default()
        });
        next_packet(&mut rx).await;
        handler.handle_data_info(&data_info(2, 8, 4)).unwrap();

        for index in 0..2 {
            let Packet::ResourcePackChunkRequest(req) = next_packet(&mut rx).await else {
                panic!("expected chunk request");
            };
            assert_eq!(req.chunk_index, index);
            handler.handle_chunk_data(chunk(2, index, vec![index as u8; 4])).unwrap();
        }
        assert_eq!(response(&next_packet(&mut rx).await), Some(PackResponse::AllPacksDownloaded));
        wait_for_resolved(&handler, 1).await;
        assert_eq!(handler.resolved_packs()[0].len(), 8);
        assert_eq!(handler.remaining(), 0);
    }

    #[tokio::test]
    async fn test_short_final_fragment_abandons_pack() {
        let (handler, mut rx, _) = handler();
        handler.handle_packs_info(&ResourcePacksInfo {
            texture_packs: vec![entry(1, 10)],
            ..Default::default()
        });
        next_packet(&mut rx).await;
        handler.handle_data_info(&data_info(1, 10, 4)).unwrap();

        for (index, len) in [(0u32, 4usize), (1, 4), (2, 1)] {
            next_packet(&mut rx).await;
            handler.handle_chunk_data(chunk(1, index, vec![0; len])).unwrap();
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handler.resolved_packs().is_empty());
        assert_eq!(handler.remaining(), 1);
        assert_eq!(handler.stage(), ClientStage::Downloading);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_pack_is_fatal() {
        let (handler, mut rx, _) = handler();
        handler.handle_packs_info(&ResourcePacksInfo {
            texture_packs: vec![entry(1, 0)],
            ..Default::default()
        });
        next_packet(&mut rx).await;
        let err = handler.handle_data_info(&data_info(1, 0, 4)).unwrap_err();
        assert!(matches!(err, TransferError::EmptyPack { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_cancelled_before_final_fragment_is_taken() {
        let (handler, mut rx, cancel) = handler();
        handler.handle_packs_info(&ResourcePacksInfo {
            texture_packs: vec![entry(1, 4)],
            ..Default::default()
        });
        next_packet(&mut rx).await;
        handler.handle_data_info(&data_info(1, 4, 4)).unwrap();
        next_packet(&mut rx).await;

        // Both the fragment and the cancellation are ready when the worker wakes.
        handler.handle_chunk_data(chunk(1, 0, vec![1, 2, 3, 4])).unwrap();
        cancel.cancel();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handler.resolved_packs().is_empty());
        assert_eq!(handler.remaining(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_checksum_mismatch_abandons_pack() {
        let (handler, mut rx, _) = handler();
        handler.handle_packs_info(&ResourcePacksInfo {
            texture_packs: vec![entry(1, 4)],
            ..Default::default()
        });
        next_packet(&mut rx).await;
        let mut info = data_info(1, 4, 4);
        info.hash = vec![0; 32];
        handler.handle_data_info(&info).unwrap();
        next_packet(&mut rx).await;
        handler.handle_chunk_data(chunk(1, 0, vec![1, 2, 3, 4])).unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handler.resolved_packs().is_empty());
        assert_eq!(handler.remaining(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancellation_stops_workers() {
        let (handler, mut rx, cancel) = handler();
        handler.handle_packs_info(&ResourcePacksInfo {
            texture_packs: vec![entry(1, 8)],
            ..Default::default()
        });
        next_packet(&mut rx).await;
        handler.handle_data_info(&data_info(1, 8, 4)).unwrap();
        next_packet(&mut rx).await;

        cancel.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(matches!(
            handler.handle_chunk_data(chunk(1, 0, vec![0; 4])),
            Err(TransferError::UnknownPack(_))
        ));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(handler.remaining(), 1);
    }

    #[tokio::test]
    async fn test_stack_checks() {
        let (handler, mut rx, _) = handler();
        let handler = handler.with_filter(Arc::new(|id: &PackId, _: usize, _: usize| {
            id.uuid != Uuid::from_u128(2)
        }));
        handler.handle_packs_info(&ResourcePacksInfo {
            texture_packs: vec![entry(1, 2), entry(2, 2)],
            ..Default::default()
        });
        next_packet(&mut rx).await;
        handler.handle_data_info(&data_info(1, 2, 4)).unwrap();
        next_packet(&mut rx).await;
        handler.handle_chunk_data(chunk(1, 0, vec![5, 6])).unwrap();
        assert_eq!(response(&next_packet(&mut rx).await), Some(PackResponse::AllPacksDownloaded));

        let stack_entry = |uuid: Uuid, version: &str| StackResourcePack {
            uuid: uuid.to_string(),
            version: version.into(),
            sub_pack_name: String::new(),
        };
        let missing = ResourcePackStack {
            texture_packs: vec![stack_entry(Uuid::from_u128(1), "1.0.0"), stack_entry(Uuid::from_u128(3), "1.0.0")],
            ..Default::default()
        };
        let err = handler.handle_stack(&missing).unwrap_err();
        assert!(err.is_fatal());
        assert_ne!(handler.stage(), ClientStage::Done);

        let exempted = burrow_types::EXEMPTED_PACKS[0];
        let ok = ResourcePackStack {
            texture_packs: vec![
                stack_entry(Uuid::from_u128(1), "1.0.0"),
                stack_entry(Uuid::from_u128(2), "1.0.0"),
                stack_entry(exempted.uuid, exempted.version),
            ],
            ..Default::default()
        };
        handler.handle_stack(&ok).unwrap();
        assert_eq!(response(&next_packet(&mut rx).await), Some(PackResponse::Completed));
        assert_eq!(handler.stage(), ClientStage::Done);
    }
}
