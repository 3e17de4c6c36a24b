use crate::error::TransferError;
use crate::session::Outgoing;
use crate::stage::ServerStage;
use burrow_protocol_core::*;
use burrow_resource::Pack;
use burrow_types::{PackId, EXEMPTED_PACKS, LATEST_GAME_VERSION};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Packs requested by the client, served one at a time.
struct ServeQueue {
    packs: Vec<Arc<dyn Pack>>,
    current: usize,
    offset: u64,
}

impl ServeQueue {
    fn current(&self) -> Option<&Arc<dyn Pack>> {
        self.packs.get(self.current)
    }
}

/// Server side of the resource pack exchange for one connection.
pub struct ServerPackHandler {
    packs: Vec<Arc<dyn Pack>>,
    chunk_size: u32,
    outbound: mpsc::UnboundedSender<Outgoing>,
    stage: ServerStage,
    queue: Option<ServeQueue>,
}

impl ServerPackHandler {
    pub fn new(
        packs: Vec<Arc<dyn Pack>>,
        chunk_size: u32,
        outbound: mpsc::UnboundedSender<Outgoing>,
    ) -> Self {
        let packs = packs
            .into_iter()
            .filter(|pack| {
                if pack.is_empty() {
                    warn!("Not serving empty pack {}", pack.id());
                }
                !pack.is_empty()
            })
            .collect();
        Self {
            packs,
            chunk_size: chunk_size.max(1),
            outbound,
            stage: ServerStage::AwaitingRequest,
            queue: None,
        }
    }

    pub fn stage(&self) -> ServerStage {
        self.stage
    }

    pub fn logged_in(&self) -> bool {
        self.stage == ServerStage::LoggedIn
    }

    fn send(&self, packet: Packet) {
        if self.outbound.send(Outgoing::Packet(packet)).is_err() {
            trace!("Writer gone, dropping outgoing packet");
        }
    }

    /// The catalog describing every served pack.
    pub fn packs_info(&self, texture_packs_required: bool) -> ResourcePacksInfo {
        let texture_packs = self
            .packs
            .iter()
            .map(|pack| {
                let mut info = TexturePackInfo {
                    uuid: pack.uuid(),
                    version: pack.version().to_string(),
                    size: pack.len(),
                    download_url: pack.download_url().to_string(),
                    ..Default::default()
                };
                if pack.encrypted() {
                    info.content_key = pack.content_key().to_string();
                    info.content_identity = pack.uuid().to_string();
                }
                info
            })
            .collect();
        ResourcePacksInfo {
            texture_pack_required: texture_packs_required,
            texture_packs,
            ..Default::default()
        }
    }

    /// Send the catalog and wait for the client's answer.
    pub fn start(&mut self, texture_packs_required: bool) {
        let info = self.packs_info(texture_packs_required);
        debug!("Offering {} resource packs", info.texture_packs.len());
        self.send(Packet::ResourcePacksInfo(info));
        self.stage = ServerStage::AwaitingResponse;
    }

    pub fn handle_client_response(
        &mut self,
        pk: &ResourcePackClientResponse,
    ) -> Result<(), TransferError> {
        let response = PackResponse::from_u8(pk.response);
        match (self.stage, response) {
            (_, Some(PackResponse::Refused)) => Err(TransferError::Refused),
            (ServerStage::AwaitingResponse, Some(PackResponse::SendPacks)) => {
                self.queue_requested(&pk.packs_to_download)?;
                self.next_pack();
                Ok(())
            }
            (ServerStage::AwaitingResponse, Some(PackResponse::AllPacksDownloaded)) => {
                self.send_stack();
                self.stage = ServerStage::AwaitingCompletion;
                Ok(())
            }
            (ServerStage::AwaitingCompletion, Some(PackResponse::Completed)) => {
                debug!("Client completed the resource pack exchange");
                self.stage = ServerStage::LoggedIn;
                Ok(())
            }
            _ => Err(TransferError::UnexpectedResponse(pk.response)),
        }
    }

    fn queue_requested(&mut self, requested: &[String]) -> Result<(), TransferError> {
        if requested.is_empty() {
            return Err(TransferError::NothingRequested);
        }
        let mut packs: Vec<Arc<dyn Pack>> = Vec::with_capacity(requested.len());
        for token in requested {
            let id: PackId = token
                .parse()
                .map_err(|_| TransferError::UnknownRequestedPack(token.clone()))?;
            let pack = self
                .packs
                .iter()
                .find(|pack| {
                    pack.uuid() == id.uuid && (id.version.is_empty() || pack.version() == id.version)
                })
                .ok_or_else(|| TransferError::UnknownRequestedPack(token.clone()))?;
            if !packs.iter().any(|queued| queued.uuid() == pack.uuid()) {
                packs.push(pack.clone());
            }
        }
        self.queue = Some(ServeQueue {
            packs,
            current: 0,
            offset: 0,
        });
        Ok(())
    }

    /// Announce the current pack of the queue, or go back to waiting for the
    /// client once every pack has been served.
    fn next_pack(&mut self) {
        let Some(pack) = self.queue.as_ref().and_then(ServeQueue::current).cloned() else {
            debug!("All requested packs served");
            self.queue = None;
            self.stage = ServerStage::AwaitingResponse;
            return;
        };
        debug!("Serving pack {}", pack.id());
        self.send(Packet::ResourcePackDataInfo(ResourcePackDataInfo {
            uuid: pack.id().composite(),
            data_chunk_size: self.chunk_size,
            chunk_count: pack.chunk_count(self.chunk_size),
            size: pack.len(),
            hash: pack.checksum().to_vec(),
            premium: false,
            pack_type: PACK_TYPE_RESOURCES,
        }));
        self.stage = ServerStage::ServingChunks;
    }

    /// Answer one chunk request for the pack currently being served.
    pub fn handle_chunk_request(
        &mut self,
        pk: &ResourcePackChunkRequest,
    ) -> Result<(), TransferError> {
        let chunk_size = self.chunk_size as u64;
        let queue = self.queue.as_mut().ok_or(TransferError::NotServing)?;
        let pack = queue.current().cloned().ok_or(TransferError::NotServing)?;

        match PackId::parse_uuid(&pk.uuid) {
            Ok(uuid) if uuid == pack.uuid() => {}
            _ => {
                return Err(TransferError::UnexpectedPack {
                    expected: pack.uuid(),
                    got: pk.uuid.clone(),
                })
            }
        }
        if queue.offset != pk.chunk_index as u64 * chunk_size {
            return Err(TransferError::UnexpectedChunkIndex {
                expected: (queue.offset / chunk_size) as u32,
                got: pk.chunk_index,
            });
        }

        let offset = queue.offset;
        let mut data = vec![0u8; chunk_size.min(pack.len().saturating_sub(offset)) as usize];
        let n = pack.read_at(&mut data, offset)?;
        data.truncate(n);
        queue.offset += chunk_size;

        let last = offset + n as u64 >= pack.len();
        trace!("Pack {} chunk {} ({} bytes)", pack.id(), pk.chunk_index, n);
        self.send(Packet::ResourcePackChunkData(ResourcePackChunkData {
            uuid: pk.uuid.clone(),
            chunk_index: pk.chunk_index,
            data_offset: offset,
            data,
        }));

        if last {
            if let Some(queue) = self.queue.as_mut() {
                queue.current += 1;
                queue.offset = 0;
            }
            self.next_pack();
        }
        Ok(())
    }

    /// Load order: every served pack, then the packs clients always have.
    fn send_stack(&self) {
        let texture_packs = self
            .packs
            .iter()
            .map(|pack| StackResourcePack {
                uuid: pack.uuid().to_string(),
                version: pack.version().to_string(),
                sub_pack_name: String::new(),
            })
            .chain(EXEMPTED_PACKS.iter().map(|pack| StackResourcePack {
                uuid: pack.uuid.to_string(),
                version: pack.version.to_string(),
                sub_pack_name: String::new(),
            }))
            .collect();
        self.send(Packet::ResourcePackStack(ResourcePackStack {
            texture_pack_required: false,
            texture_packs,
            base_game_version: LATEST_GAME_VERSION.to_string(),
            ..Default::default()
        }));
    }
}
