use burrow_protocol_core::Packet;

/// Handshake progress of a joining client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStage {
    AwaitingNetworkSettings,
    AwaitingPacksInfo,
    Downloading,
    AwaitingStack,
    Done,
}

impl ClientStage {
    /// Packets the client handles in this stage. Anything else is ignored.
    pub fn accepts(self, packet: &Packet) -> bool {
        if matches!(packet, Packet::Disconnect(_)) {
            return true;
        }
        match self {
            ClientStage::AwaitingNetworkSettings => {
                matches!(packet, Packet::NetworkSettings(_) | Packet::PlayStatus(_))
            }
            ClientStage::AwaitingPacksInfo => {
                matches!(packet, Packet::PlayStatus(_) | Packet::ResourcePacksInfo(_))
            }
            ClientStage::Downloading => matches!(
                packet,
                Packet::ResourcePackDataInfo(_) | Packet::ResourcePackChunkData(_)
            ),
            ClientStage::AwaitingStack => matches!(packet, Packet::ResourcePackStack(_)),
            ClientStage::Done => false,
        }
    }
}

/// Handshake progress of a connected client as tracked by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStage {
    AwaitingRequest,
    AwaitingResponse,
    ServingChunks,
    AwaitingCompletion,
    LoggedIn,
}

impl ServerStage {
    pub fn accepts(self, packet: &Packet) -> bool {
        if matches!(packet, Packet::Disconnect(_)) {
            return true;
        }
        match self {
            ServerStage::AwaitingRequest => matches!(packet, Packet::RequestNetworkSettings(_)),
            ServerStage::AwaitingResponse | ServerStage::AwaitingCompletion => {
                matches!(packet, Packet::ResourcePackClientResponse(_))
            }
            ServerStage::ServingChunks => matches!(packet, Packet::ResourcePackChunkRequest(_)),
            ServerStage::LoggedIn => !matches!(packet, Packet::RequestNetworkSettings(_)),
        }
    }
}
