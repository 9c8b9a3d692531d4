//! Project setup — `corkboard init`.

use std::path::Path;

use anyhow::{Context, Result};
use corkboard::config::{CORKBOARD_DIR, CorkboardConfig};

pub async fn cmd_init(project_dir: &Path, config: &CorkboardConfig) -> Result<()> {
    let corkboard_dir = project_dir.join(CORKBOARD_DIR);
    std::fs::create_dir_all(&corkboard_dir)
        .with_context(|| format!("Failed to create {}", corkboard_dir.display()))?;

    let config_path = CorkboardConfig::path_for(project_dir);
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
    } else {
        config.save(&config_path)?;
        println!("Created {}", config_path.display());
    }

    let repo = corkboard::board::open_repository(config, project_dir).await?;
    let count = repo.list(true).await.len();
    println!(
        "Storage ready ({} backend, {} board{})",
        config.storage.backend,
        count,
        if count == 1 { "" } else { "s" }
    );
    Ok(())
}
