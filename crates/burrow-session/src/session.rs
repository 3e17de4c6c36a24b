use crate::client::{ClientPackHandler, DownloadFilter};
use crate::config::SessionConfig;
use crate::error::TransferError;
use crate::server::ServerPackHandler;
use crate::stage::{ClientStage, ServerStage};
use anyhow::{anyhow, bail, Result};
use burrow_protocol_core::*;
use burrow_protocol_v712::V712Protocol;
use burrow_resource::{Pack, PackDecoder};
use burrow_types::LATEST_PROTOCOL;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Work for a connection's writer task.
#[derive(Debug)]
pub enum Outgoing {
    Packet(Packet),
    /// Compress batches from now on.
    EnableCompression(u16),
    /// Flush what was queued before and shut the stream down.
    Close,
}

/// Adapter for a client's protocol revision, if supported.
pub fn supported_protocol(id: i32) -> Option<Arc<dyn Protocol>> {
    match id {
        LATEST_PROTOCOL => Some(Arc::new(LatestProtocol::new())),
        burrow_protocol_v712::PROTOCOL_ID => Some(Arc::new(V712Protocol::new())),
        _ => None,
    }
}

/// Serve `packs` to one connecting client until it disconnects or the
/// exchange fails.
pub async fn serve<S>(
    stream: S,
    peer: &str,
    packs: Vec<Arc<dyn Pack>>,
    config: &SessionConfig,
    cancel: CancellationToken,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let policy = config.dispatch_policy();
    let (mut reader, mut writer) = Connection::new(stream).into_split();

    // === Network settings ===
    let latest = LatestProtocol::new();
    let request = loop {
        let packets = read_packets(&mut reader, &latest, &policy, &cancel).await?;
        if let Some(Packet::RequestNetworkSettings(request)) = packets
            .into_iter()
            .find(|packet| ServerStage::AwaitingRequest.accepts(packet))
        {
            break request;
        }
    };
    debug!("{} requested network settings for protocol {}", peer, request.client_protocol);

    let Some(protocol) = supported_protocol(request.client_protocol) else {
        let status = if request.client_protocol < LATEST_PROTOCOL {
            PLAY_STATUS_LOGIN_FAILED_CLIENT
        } else {
            PLAY_STATUS_LOGIN_FAILED_SERVER
        };
        warn!(
            "{} has unsupported protocol {}, expected {}",
            peer, request.client_protocol, LATEST_PROTOCOL
        );
        let mut packet = Packet::PlayStatus(PlayStatus { status });
        let raw = encode_packet(&latest, Header::new(packet.id()), &mut packet, policy.shield_item_id)?;
        writer.write_packet(&raw).await?;
        writer.shutdown().await?;
        return Ok(());
    };

    let mut settings = Packet::NetworkSettings(NetworkSettings {
        compression_threshold: config.compression_threshold,
        compression_algorithm: COMPRESSION_FLATE,
        ..Default::default()
    });
    let raw = encode_packet(&*protocol, Header::new(settings.id()), &mut settings, policy.shield_item_id)?;
    writer.write_packet(&raw).await?;
    writer.enable_compression(config.compression_threshold);
    reader.enable_compression();

    let (outbound, rx) = mpsc::unbounded_channel();
    let writer_task = spawn_writer(writer, rx, protocol.clone(), policy.shield_item_id, peer.to_string());

    let mut handler = ServerPackHandler::new(packs, config.chunk_size, outbound.clone());
    let _ = outbound.send(Outgoing::Packet(Packet::PlayStatus(PlayStatus {
        status: PLAY_STATUS_LOGIN_SUCCESS,
    })));
    handler.start(config.texture_packs_required);

    let result = serve_loop(&mut reader, &mut handler, &outbound, &*protocol, &policy, &cancel, peer).await;
    cancel.cancel();
    let _ = outbound.send(Outgoing::Close);
    drop(outbound);
    let _ = writer_task.await;
    result
}

async fn serve_loop<S>(
    reader: &mut ConnectionReader<S>,
    handler: &mut ServerPackHandler,
    outbound: &mpsc::UnboundedSender<Outgoing>,
    protocol: &dyn Protocol,
    policy: &DispatchPolicy,
    cancel: &CancellationToken,
    peer: &str,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let packets = match read_packets(reader, protocol, policy, cancel).await {
            Ok(packets) => packets,
            Err(e) if handler.logged_in() => {
                debug!("Connection {} ended: {}", peer, e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        for packet in packets {
            let stage = handler.stage();
            if !stage.accepts(&packet) {
                debug!("Ignoring {} from {} in stage {:?}", packet.name(), peer, stage);
                continue;
            }
            match packet {
                Packet::Disconnect(pk) => {
                    info!("{} disconnected: {}", peer, pk.message);
                    return Ok(());
                }
                Packet::ResourcePackClientResponse(pk) => {
                    contain(handler.handle_client_response(&pk), peer)?;
                    if handler.logged_in() {
                        info!("{} logged in", peer);
                        let _ = outbound.send(Outgoing::Packet(Packet::PlayStatus(PlayStatus {
                            status: PLAY_STATUS_PLAYER_SPAWN,
                        })));
                    }
                }
                Packet::ResourcePackChunkRequest(pk) => {
                    contain(handler.handle_chunk_request(&pk), peer)?;
                }
                other => trace!("{} sent {}", peer, other.name()),
            }
        }
    }
}

/// Join a server over `stream` speaking `protocol`, download its packs and
/// return them once the exchange completes.
pub async fn join<S>(
    stream: S,
    protocol: Arc<dyn Protocol>,
    config: &SessionConfig,
    decoder: Arc<dyn PackDecoder>,
    filter: Option<DownloadFilter>,
    cancel: CancellationToken,
) -> Result<Vec<Arc<dyn Pack>>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let policy = config.dispatch_policy();
    let (mut reader, writer) = Connection::new(stream).into_split();
    let (outbound, rx) = mpsc::unbounded_channel();
    let writer_task = spawn_writer(writer, rx, protocol.clone(), policy.shield_item_id, "server".into());

    let mut handler = ClientPackHandler::new(outbound.clone(), cancel.clone(), decoder);
    if let Some(filter) = filter {
        handler = handler.with_filter(filter);
    }

    let _ = outbound.send(Outgoing::Packet(Packet::RequestNetworkSettings(
        RequestNetworkSettings {
            client_protocol: protocol.id(),
        },
    )));

    let result = join_loop(&mut reader, &handler, &outbound, &*protocol, &policy, &cancel).await;
    cancel.cancel();
    let _ = outbound.send(Outgoing::Close);
    drop(outbound);
    drop(handler);
    let _ = writer_task.await;
    result
}

async fn join_loop<S>(
    reader: &mut ConnectionReader<S>,
    handler: &ClientPackHandler,
    outbound: &mpsc::UnboundedSender<Outgoing>,
    protocol: &dyn Protocol,
    policy: &DispatchPolicy,
    cancel: &CancellationToken,
) -> Result<Vec<Arc<dyn Pack>>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        for packet in read_packets(reader, protocol, policy, cancel).await? {
            let stage = handler.stage();
            if !stage.accepts(&packet) {
                debug!("Ignoring {} in stage {:?}", packet.name(), stage);
                continue;
            }
            match packet {
                Packet::Disconnect(pk) => bail!("Disconnected by server: {}", pk.message),
                Packet::NetworkSettings(pk) => {
                    debug!("Compression threshold {}", pk.compression_threshold);
                    reader.enable_compression();
                    let _ = outbound.send(Outgoing::EnableCompression(pk.compression_threshold));
                    handler.on_network_settings();
                }
                Packet::PlayStatus(pk) => match pk.status {
                    PLAY_STATUS_LOGIN_SUCCESS => debug!("Login accepted"),
                    status => bail!("Login failed with status {}", status),
                },
                Packet::ResourcePacksInfo(pk) => handler.handle_packs_info(&pk),
                Packet::ResourcePackDataInfo(pk) => contain(handler.handle_data_info(&pk), "server")?,
                Packet::ResourcePackChunkData(pk) => {
                    contain(handler.handle_chunk_data(pk), "server")?
                }
                Packet::ResourcePackStack(pk) => contain(handler.handle_stack(&pk), "server")?,
                other => trace!("Unhandled {}", other.name()),
            }
            if handler.stage() == ClientStage::Done {
                info!("Resource pack exchange complete");
                return Ok(handler.resolved_packs());
            }
        }
    }
}

/// Pack-local failures are logged; anything else ends the session.
fn contain(result: Result<(), TransferError>, peer: &str) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_fatal() => Err(anyhow!(e)),
        Err(e) => {
            warn!("Resource pack transfer with {} failed: {}", peer, e);
            Ok(())
        }
    }
}

/// Read until at least one packet decodes. Bad headers and, unless the policy
/// says otherwise, undecodable packets are skipped.
async fn read_packets<S>(
    reader: &mut ConnectionReader<S>,
    protocol: &dyn Protocol,
    policy: &DispatchPolicy,
    cancel: &CancellationToken,
) -> Result<Vec<Packet>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let raw = tokio::select! {
            _ = cancel.cancelled() => bail!("Session cancelled"),
            raw = reader.read_packet() => raw?,
        };
        let mut observe = |header: &Header, payload: &[u8]| {
            trace!("Received packet 0x{:02X} ({} bytes)", header.packet_id, payload.len());
        };
        let data = match PacketData::parse_with(raw, Some(&mut observe as PacketObserver)) {
            Ok(data) => data,
            Err(e) => {
                warn!("Dropping packet: {}", e);
                continue;
            }
        };
        match data.decode(protocol.pool(), protocol, policy) {
            Ok(decoded) => {
                if let Some(e) = decoded.error {
                    warn!("{}", e);
                }
                if !decoded.packets.is_empty() {
                    return Ok(decoded.packets);
                }
            }
            Err(e) if e.should_disconnect(policy) => return Err(e.into()),
            Err(e) => warn!("{}", e),
        }
    }
}

fn spawn_writer<S>(
    mut writer: ConnectionWriter<S>,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
    protocol: Arc<dyn Protocol>,
    shield_id: i32,
    peer: String,
) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(outgoing) = rx.recv().await {
            let result = match outgoing {
                Outgoing::Packet(packet) => write_packet(&mut writer, &*protocol, packet, shield_id).await,
                Outgoing::EnableCompression(threshold) => {
                    writer.enable_compression(threshold);
                    Ok(())
                }
                Outgoing::Close => {
                    let _ = writer.shutdown().await;
                    break;
                }
            };
            if let Err(e) = result {
                debug!("Writer error for {}: {}", peer, e);
                break;
            }
        }
    })
}

async fn write_packet<S>(
    writer: &mut ConnectionWriter<S>,
    protocol: &dyn Protocol,
    packet: Packet,
    shield_id: i32,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    for mut packet in protocol.convert_from_latest(packet) {
        trace!("Sending {}", packet.name());
        let raw = encode_packet(protocol, Header::new(packet.id()), &mut packet, shield_id)?;
        writer.write_packet(&raw).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_resource::{MemoryPack, RawPackDecoder};
    use burrow_types::{PackId, EXEMPTED_PACKS};
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use uuid::Uuid;

    /// Scripted end of a connection built from the same codec.
    struct Peer {
        conn: Connection<DuplexStream>,
        proto: LatestProtocol,
    }

    impl Peer {
        fn new(stream: DuplexStream) -> Self {
            Self {
                conn: Connection::new(stream),
                proto: LatestProtocol::new(),
            }
        }

        async fn send(&mut self, mut packet: Packet) {
            let raw = encode_packet(&self.proto, Header::new(packet.id()), &mut packet, 0).unwrap();
            self.conn.write_packet(&raw).await.unwrap();
        }

        async fn recv(&mut self) -> Packet {
            let raw = tokio::time::timeout(Duration::from_secs(5), self.conn.read_packet())
                .await
                .unwrap()
                .unwrap();
            let decoded = PacketData::parse(raw)
                .unwrap()
                .decode(self.proto.pool(), &self.proto, &DispatchPolicy::default())
                .unwrap();
            decoded.packets.into_iter().next().unwrap()
        }

        async fn response(&mut self) -> ResourcePackClientResponse {
            match self.recv().await {
                Packet::ResourcePackClientResponse(r) => r,
                other => panic!("expected client response, got {:?}", other),
            }
        }

        /// Play the server side of network settings negotiation.
        async fn accept(&mut self) {
            let Packet::RequestNetworkSettings(req) = self.recv().await else {
                panic!("expected network settings request");
            };
            assert_eq!(req.client_protocol, LATEST_PROTOCOL);
            self.send(Packet::NetworkSettings(NetworkSettings {
                compression_threshold: 256,
                ..Default::default()
            }))
            .await;
            self.conn.enable_compression(256);
            self.send(Packet::PlayStatus(PlayStatus {
                status: PLAY_STATUS_LOGIN_SUCCESS,
            }))
            .await;
        }
    }

    fn pack_data(len: usize) -> Bytes {
        Bytes::from((0..len).map(|i| (i * 7 % 256) as u8).collect::<Vec<_>>())
    }

    fn memory_pack(n: u128, len: usize) -> Arc<dyn Pack> {
        Arc::new(MemoryPack::new(PackId::new(Uuid::from_u128(n), "1.0.0"), pack_data(len)))
    }

    fn spawn_join(stream: DuplexStream) -> JoinHandle<Result<Vec<Arc<dyn Pack>>>> {
        tokio::spawn(async move {
            join(
                stream,
                Arc::new(LatestProtocol::new()),
                &SessionConfig::default(),
                Arc::new(RawPackDecoder),
                None,
                CancellationToken::new(),
            )
            .await
        })
    }

    #[tokio::test]
    async fn test_client_downloads_in_three_chunks() {
        let (a, b) = tokio::io::duplex(1 << 20);
        let client = spawn_join(a);
        let mut server = Peer::new(b);
        server.accept().await;

        let uuid = Uuid::from_u128(0x51);
        let data = pack_data(300_000);
        server
            .send(Packet::ResourcePacksInfo(ResourcePacksInfo {
                texture_packs: vec![TexturePackInfo {
                    uuid,
                    version: "1.0.0".into(),
                    size: 300_000,
                    ..Default::default()
                }],
                ..Default::default()
            }))
            .await;
        let r = server.response().await;
        assert_eq!(r.response, PackResponse::SendPacks as u8);
        assert_eq!(r.packs_to_download, vec![format!("{}_1.0.0", uuid)]);

        server
            .send(Packet::ResourcePackDataInfo(ResourcePackDataInfo {
                uuid: r.packs_to_download[0].clone(),
                data_chunk_size: 131_072,
                chunk_count: 3,
                size: 300_000,
                ..Default::default()
            }))
            .await;

        let mut indices = Vec::new();
        let mut last_len = 0;
        for _ in 0..3 {
            let Packet::ResourcePackChunkRequest(req) = server.recv().await else {
                panic!("expected chunk request");
            };
            indices.push(req.chunk_index);
            let start = req.chunk_index as usize * 131_072;
            let end = (start + 131_072).min(data.len());
            last_len = end - start;
            server
                .send(Packet::ResourcePackChunkData(ResourcePackChunkData {
                    uuid: req.uuid,
                    chunk_index: req.chunk_index,
                    data_offset: start as u64,
                    data: data[start..end].to_vec(),
                }))
                .await;
        }
        assert_eq!(indices, [0, 1, 2]);
        assert_eq!(last_len, 37_856);
        assert_eq!(server.response().await.response, PackResponse::AllPacksDownloaded as u8);

        let exempted = EXEMPTED_PACKS[0];
        server
            .send(Packet::ResourcePackStack(ResourcePackStack {
                texture_packs: vec![
                    StackResourcePack {
                        uuid: uuid.to_string(),
                        version: "1.0.0".into(),
                        sub_pack_name: String::new(),
                    },
                    StackResourcePack {
                        uuid: exempted.uuid.to_string(),
                        version: exempted.version.into(),
                        sub_pack_name: String::new(),
                    },
                ],
                ..Default::default()
            }))
            .await;
        assert_eq!(server.response().await.response, PackResponse::Completed as u8);

        let packs = client.await.unwrap().unwrap();
        assert_eq!(packs.len(), 1);
        assert_eq!(packs[0].len(), 300_000);
    }

    #[tokio::test]
    async fn test_three_packs_request_chunks_in_order() {
        let (a, b) = tokio::io::duplex(1 << 20);
        let client = spawn_join(a);
        let mut server = Peer::new(b);
        server.accept().await;

        const CHUNK: usize = 1000;
        let packs: Vec<(Uuid, Bytes)> = [(0xA1, 2500), (0xB2, 2100), (0xC3, 3000)]
            .into_iter()
            .map(|(n, len)| (Uuid::from_u128(n), pack_data(len)))
            .collect();
        server
            .send(Packet::ResourcePacksInfo(ResourcePacksInfo {
                texture_packs: packs
                    .iter()
                    .map(|(uuid, data)| TexturePackInfo {
                        uuid: *uuid,
                        version: "1.0.0".into(),
                        size: data.len() as u64,
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }))
            .await;
        let r = server.response().await;
        assert_eq!(r.packs_to_download.len(), 3);

        for (uuid, data) in &packs {
            server
                .send(Packet::ResourcePackDataInfo(ResourcePackDataInfo {
                    uuid: format!("{}_1.0.0", uuid),
                    data_chunk_size: CHUNK as u32,
                    chunk_count: 3,
                    size: data.len() as u64,
                    ..Default::default()
                }))
                .await;
        }

        let mut requested: HashMap<String, Vec<u32>> = HashMap::new();
        for _ in 0..3 {
            let mut round = Vec::new();
            for _ in 0..packs.len() {
                let Packet::ResourcePackChunkRequest(req) = server.recv().await else {
                    panic!("expected chunk request");
                };
                round.push(req);
            }
            // Each pack has exactly one request outstanding until it is answered.
            assert!(
                tokio::time::timeout(Duration::from_millis(50), server.conn.read_packet())
                    .await
                    .is_err()
            );
            for req in round {
                let uuid = PackId::parse_uuid(&req.uuid).unwrap();
                let (_, data) = packs.iter().find(|(id, _)| *id == uuid).unwrap();
                let start = req.chunk_index as usize * CHUNK;
                let end = (start + CHUNK).min(data.len());
                requested.entry(req.uuid.clone()).or_default().push(req.chunk_index);
                server
                    .send(Packet::ResourcePackChunkData(ResourcePackChunkData {
                        uuid: req.uuid,
                        chunk_index: req.chunk_index,
                        data_offset: start as u64,
                        data: data[start..end].to_vec(),
                    }))
                    .await;
            }
        }

        assert_eq!(requested.len(), 3);
        for indices in requested.values() {
            assert_eq!(indices, &[0, 1, 2]);
        }
        assert_eq!(server.response().await.response, PackResponse::AllPacksDownloaded as u8);

        server
            .send(Packet::ResourcePackStack(ResourcePackStack {
                texture_packs: packs
                    .iter()
                    .map(|(uuid, _)| StackResourcePack {
                        uuid: uuid.to_string(),
                        version: "1.0.0".into(),
                        sub_pack_name: String::new(),
                    })
                    .collect(),
                ..Default::default()
            }))
            .await;
        assert_eq!(server.response().await.response, PackResponse::Completed as u8);
        assert_eq!(client.await.unwrap().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_catalog_skips_transfer() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let client = spawn_join(a);
        let mut server = Peer::new(b);
        server.accept().await;

        server.send(Packet::ResourcePacksInfo(ResourcePacksInfo::default())).await;
        assert_eq!(server.response().await.response, PackResponse::AllPacksDownloaded as u8);
        server.send(Packet::ResourcePackStack(ResourcePackStack::default())).await;
        assert_eq!(server.response().await.response, PackResponse::Completed as u8);
        assert!(client.await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_stack_entry_closes_without_completing() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let client = spawn_join(a);
        let mut server = Peer::new(b);
        server.accept().await;

        server.send(Packet::ResourcePacksInfo(ResourcePacksInfo::default())).await;
        server.response().await;
        server
            .send(Packet::ResourcePackStack(ResourcePackStack {
                texture_packs: vec![StackResourcePack {
                    uuid: Uuid::from_u128(0x77).to_string(),
                    version: "1.0.0".into(),
                    sub_pack_name: String::new(),
                }],
                ..Default::default()
            }))
            .await;

        let err = client.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("not downloaded"));
        assert!(server.conn.read_packet().await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_packet_policy() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let config = SessionConfig {
            disconnect_on_unknown_packet: true,
            ..Default::default()
        };
        let client = tokio::spawn(async move {
            join(
                a,
                Arc::new(LatestProtocol::new()),
                &config,
                Arc::new(RawPackDecoder),
                None,
                CancellationToken::new(),
            )
            .await
        });
        let mut server = Peer::new(b);
        server.accept().await;
        server
            .send(Packet::Unknown {
                packet_id: 0x3FE,
                payload: vec![1, 2, 3],
            })
            .await;
        let err = client.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("unexpected packet"));
    }

    #[tokio::test]
    async fn test_server_rejects_unsupported_protocol() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let server = tokio::spawn(async move {
            serve(a, "test", Vec::new(), &SessionConfig::default(), CancellationToken::new()).await
        });
        let mut client = Peer::new(b);
        client
            .send(Packet::RequestNetworkSettings(RequestNetworkSettings {
                client_protocol: 100,
            }))
            .await;
        let Packet::PlayStatus(status) = client.recv().await else {
            panic!("expected play status");
        };
        assert_eq!(status.status, PLAY_STATUS_LOGIN_FAILED_CLIENT);
        assert!(client.conn.read_packet().await.is_err());
        server.await.unwrap().unwrap();
    }

    async fn exchange(protocol: Arc<dyn Protocol>) {
        let (a, b) = tokio::io::duplex(1 << 20);
        let served = vec![memory_pack(1, 300_000), memory_pack(2, 131_072)];
        let config = SessionConfig::default();
        let server_packs = served.clone();
        let server = tokio::spawn(async move {
            serve(a, "client", server_packs, &config, CancellationToken::new()).await
        });

        let packs = join(
            b,
            protocol,
            &SessionConfig::default(),
            Arc::new(RawPackDecoder),
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(packs.len(), served.len());
        for pack in &served {
            let got = packs.iter().find(|p| p.uuid() == pack.uuid()).unwrap();
            assert_eq!(got.checksum(), pack.checksum());
        }
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_full_exchange_latest() {
        exchange(Arc::new(LatestProtocol::new())).await;
    }

    #[tokio::test]
    async fn test_full_exchange_legacy() {
        exchange(Arc::new(V712Protocol::new())).await;
    }

    #[tokio::test]
    async fn test_client_refusal_closes_server() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let server = tokio::spawn(async move {
            serve(a, "client", vec![memory_pack(1, 10)], &SessionConfig::default(), CancellationToken::new()).await
        });
        let mut client = Peer::new(b);
        client
            .send(Packet::RequestNetworkSettings(RequestNetworkSettings {
                client_protocol: LATEST_PROTOCOL,
            }))
            .await;
        assert!(matches!(client.recv().await, Packet::NetworkSettings(_)));
        client.conn.enable_compression(256);
        assert!(matches!(client.recv().await, Packet::PlayStatus(_)));
        assert!(matches!(client.recv().await, Packet::ResourcePacksInfo(_)));

        client
            .send(Packet::ResourcePackClientResponse(ResourcePackClientResponse::new(
                PackResponse::Refused,
            )))
            .await;
        assert!(server.await.unwrap().is_err());
        assert!(client.conn.read_packet().await.is_err());
    }
}
