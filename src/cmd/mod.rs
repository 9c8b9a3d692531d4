//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled                  |
//! |------------|-----------------------------------|
//! | `init`     | `Init`                            |
//! | `serve`    | `Serve`                           |
//! | `boards`   | `Boards`                          |
//! | `transfer` | `Export`, `Import`                |
//! | `config`   | `Config`                          |

pub mod boards;
pub mod config;
pub mod init;
pub mod serve;
pub mod transfer;

pub use boards::cmd_boards;
pub use config::cmd_config;
pub use init::cmd_init;
pub use serve::cmd_serve;
pub use transfer::{cmd_export, cmd_import};
