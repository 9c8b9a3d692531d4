//! HTTP server command — `corkboard serve`.

use std::path::Path;

use anyhow::Result;
use corkboard::board::server::{ServerConfig, start_server};
use corkboard::config::CorkboardConfig;

pub async fn cmd_serve(
    project_dir: &Path,
    config: CorkboardConfig,
    port: Option<u16>,
    host: Option<String>,
    dev: bool,
) -> Result<()> {
    let repo = corkboard::board::open_repository(&config, project_dir).await?;

    start_server(
        ServerConfig {
            host: host.unwrap_or(config.server.host),
            port: port.unwrap_or(config.server.port),
            cors_permissive: dev || config.server.cors_permissive,
        },
        repo,
    )
    .await
}
