//! Board management commands — `corkboard boards`.

use std::path::Path;

use anyhow::Result;
use corkboard::config::CorkboardConfig;

use super::super::BoardsCommands;

pub async fn cmd_boards(
    project_dir: &Path,
    config: &CorkboardConfig,
    command: BoardsCommands,
) -> Result<()> {
    let repo = corkboard::board::open_repository(config, project_dir).await?;

    match command {
        BoardsCommands::List { all, json } => {
            let metadata = repo.metadata(all).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&metadata)?);
                return Ok(());
            }
            if metadata.is_empty() {
                println!("No boards.");
                return Ok(());
            }
            for board in metadata {
                println!(
                    "{}  {:<30} {:>3} lists {:>4} cards  {}{}",
                    board.id,
                    board.title,
                    board.list_count,
                    board.card_count,
                    board.last_modified.format("%Y-%m-%d %H:%M"),
                    if board.is_archived { "  [archived]" } else { "" }
                );
            }
        }
        BoardsCommands::Create { title } => {
            let id = repo.create(&title).await?;
            println!("{}", id);
        }
        BoardsCommands::Archive { id } => {
            repo.archive(id).await?;
            println!("Archived board {}", id);
        }
        BoardsCommands::Unarchive { id } => {
            repo.unarchive(id).await?;
            println!("Restored board {}", id);
        }
        BoardsCommands::Delete { id } => {
            repo.delete(id).await?;
            println!("Deleted board {}", id);
        }
    }

    Ok(())
}
