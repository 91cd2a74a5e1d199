use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
pub struct Cli {
    /// Directory whose regular files are copied into the image
    #[arg(long, short)]
    pub source: PathBuf,

    /// Output directory
    #[arg(long, short = 'O')]
    pub out_dir: PathBuf,

    /// Image size in MiB
    #[arg(long, default_value_t = 16)]
    pub size: u64,
}
