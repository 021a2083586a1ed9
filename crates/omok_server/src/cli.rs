//! Command-line interface for omok.

use clap::{Parser, Subcommand};
use omok_core::GameId;

/// Omok - five in a row over a shared SQLite store
#[derive(Parser, Debug)]
#[command(name = "omok")]
#[command(about = "Two-player five-in-a-row with realtime sync and turn clocks", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the database file (created and migrated if missing)
    #[arg(long, global = true, default_value = "omok.db")]
    pub db: String,

    /// Session config file (TOML); defaults apply when absent
    #[arg(long, global = true, default_value = "omok.toml")]
    pub config: std::path::PathBuf,

    /// Player identity
    #[arg(long, global = true, env = "OMOK_PLAYER")]
    pub player: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a game and take the black seat
    Create {
        /// Game title
        #[arg(short, long)]
        title: String,
    },

    /// Take the white seat of a game
    Join {
        /// Game to join
        #[arg(short, long)]
        game: GameId,
    },

    /// List all games
    List,

    /// Print a game's board
    Show {
        /// Game to show
        #[arg(short, long)]
        game: GameId,
    },

    /// Play a game interactively (enter cells as `row,col` or an index)
    Play {
        /// Game to play
        #[arg(short, long)]
        game: GameId,
    },
}
