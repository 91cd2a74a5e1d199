use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
pub struct Cli {
    /// Volume name
    #[arg(long, short, default_value = "SOFS16")]
    pub name: String,

    /// Number of inodes, defaults to an eighth of the blocks
    #[arg(long, short, default_value_t = 0)]
    pub inodes: u32,

    /// Blocks per cluster
    #[arg(long, short, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..=8))]
    pub cluster_blocks: u32,

    /// Fill free clusters with zeros
    #[arg(long, short)]
    pub zero: bool,

    /// Only report errors
    #[arg(long, short)]
    pub quiet: bool,

    /// Create or resize the image to this many MiB before formatting
    #[arg(long)]
    pub size: Option<u64>,

    /// Device image to format
    pub device: PathBuf,
}
