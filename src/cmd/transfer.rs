//! Export and import commands — `corkboard export`, `corkboard import`.

use std::path::Path;

use anyhow::{Context, Result};
use corkboard::config::CorkboardConfig;
use uuid::Uuid;

pub async fn cmd_export(
    project_dir: &Path,
    config: &CorkboardConfig,
    board: Option<Uuid>,
    output: Option<&Path>,
) -> Result<()> {
    let repo = corkboard::board::open_repository(config, project_dir).await?;
    let json = match board {
        Some(id) => repo.export_board(id).await?,
        None => repo.export_all_boards().await?,
    };

    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Fails only when nothing could be imported and there was something wrong.
pub async fn cmd_import(project_dir: &Path, config: &CorkboardConfig, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let repo = corkboard::board::open_repository(config, project_dir).await?;
    let report = repo.import_boards(&raw).await;

    println!(
        "Imported {} board{}, skipped {}",
        report.imported,
        if report.imported == 1 { "" } else { "s" },
        report.skipped
    );
    for error in &report.errors {
        eprintln!("  - {}", error);
    }

    if report.imported == 0 && !report.errors.is_empty() {
        anyhow::bail!("Import failed: {}", report.errors.join("; "));
    }
    Ok(())
}
