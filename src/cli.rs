use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::app::queue::PlayOrder;

#[derive(Parser, Debug)]
#[command(name = "stream-player", version, about = "Play catalog playlists from the terminal")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Config file (defaults to <config dir>/stream-player/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format: console or json
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Include source file and line in log records
    #[arg(long, global = true)]
    pub log_caller: bool,

    /// Catalog API token (or STREAM_PLAYER_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a playlist
    Play {
        /// Playlist URL (overrides the config file)
        #[arg(long)]
        url: Option<String>,

        /// Order in which tracks are played
        #[arg(long, value_enum)]
        order: Option<PlayOrder>,

        /// Index of the first track to play
        #[arg(long, default_value_t = 0)]
        start: usize,
    },

    /// Resolve, fetch and decode one track without playing it
    Probe {
        /// Playlist URL
        #[arg(long)]
        url: Option<String>,

        /// Index of the track to probe
        #[arg(long, default_value_t = 0)]
        track: usize,
    },

    /// Check the configured token against the catalog
    Whoami,
}
