mod config;

use burrow_resource::{MemoryPack, Pack};
use burrow_session::serve;
use burrow_types::{LATEST_GAME_VERSION, LATEST_PROTOCOL};
use config::ServerConfig;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(
        "Starting Burrow server (protocol {}, {})...",
        LATEST_PROTOCOL, LATEST_GAME_VERSION
    );

    let config = Arc::new(ServerConfig::load(Path::new("config/server.toml"))?);
    info!(
        "Config loaded: bind={}:{}, chunk_size={}, packs={}",
        config.bind,
        config.port,
        config.session.chunk_size,
        config.packs.len()
    );

    let packs = Arc::new(load_packs(&config)?);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    let shutdown = CancellationToken::new();
    let ctrlc = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal");
        ctrlc.cancel();
    });

    tokio::select! {
        _ = shutdown.cancelled() => {
            info!("Server shut down cleanly");
        }
        _ = accept_loop(listener, config, packs, shutdown.clone()) => {
            error!("Accept loop exited unexpectedly");
        }
    }

    Ok(())
}

fn load_packs(config: &ServerConfig) -> anyhow::Result<Vec<Arc<dyn Pack>>> {
    let mut packs: Vec<Arc<dyn Pack>> = Vec::with_capacity(config.packs.len());
    for entry in &config.packs {
        let pack = MemoryPack::from_path(&entry.path, entry.id.clone())?
            .with_download_url(entry.download_url.as_str());
        info!("Loaded pack {} ({} bytes)", pack.id(), pack.len());
        if entry.content_key.is_empty() {
            packs.push(Arc::new(pack));
        } else {
            packs.push(pack.with_content_key(&entry.content_key));
        }
    }
    Ok(packs)
}

async fn accept_loop(
    listener: TcpListener,
    config: Arc<ServerConfig>,
    packs: Arc<Vec<Arc<dyn Pack>>>,
    shutdown: CancellationToken,
) {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                info!("New connection from {}", peer);
                let config = config.clone();
                let packs = packs.clone();
                let cancel = shutdown.child_token();
                tokio::spawn(async move {
                    let peer = peer.to_string();
                    if let Err(e) = serve(socket, &peer, packs.to_vec(), &config.session, cancel).await {
                        debug!("Connection {} ended: {:#}", peer, e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
