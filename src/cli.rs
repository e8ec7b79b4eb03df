use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ytx-server",
    about = "HTTP service returning YouTube video transcripts",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    pub bind: Option<String>,

    /// Directory for temporary subtitle files
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Per-strategy timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Config file (default: ~/.config/ytx-server/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
