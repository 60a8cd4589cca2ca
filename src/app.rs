use std::{io::ErrorKind, sync::Arc};

use color_eyre::{
    Result,
    eyre::{Report, eyre},
};
use tracing::{info, warn};

use crate::{
    config::Config,
    favorites::{FavoritesStore, JsonFileRepository},
    provider::AwsLogProvider,
    server,
    state::{AppState, ListLimits},
};

pub struct LogscopeApp {
    server: Option<server::ServerHandle>,
}

impl LogscopeApp {
    pub async fn bootstrap(config: Config) -> Result<Self> {
        let provider = AwsLogProvider::from_env(config.region.clone(), config.profile.clone()).await;
        let favorites = FavoritesStore::new(Arc::new(JsonFileRepository::new(
            config.favorites_path.clone(),
        )));
        let limits = ListLimits {
            groups: config.group_limit,
            streams: config.stream_limit,
        };
        let state = Arc::new(AppState::new(Arc::new(provider), favorites, limits));

        let bind_addr = config.bind_addr;
        let server = server::spawn(state, server::ServerConfig { bind_addr })
            .await
            .map_err(|err| match err {
                server::ServerError::Io(io_err) if io_err.kind() == ErrorKind::AddrInUse => eyre!(
                    "Port {} is already in use. Pass --bind <addr:port> to choose a different address.",
                    bind_addr
                ),
                other => Report::from(other),
            })?;

        info!(
            addr = %server.addr(),
            favorites = %config.favorites_path.display(),
            "logscope ready"
        );

        Ok(Self {
            server: Some(server),
        })
    }

    pub async fn run(mut self) -> Result<()> {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "failed to listen for ctrl+c");
        } else {
            info!("received ctrl+c");
        }

        if let Some(server) = self.server.take() {
            server.shutdown().await?;
        }

        info!("logscope shutting down");
        Ok(())
    }
}
