mod cli;

use std::io;
use std::sync::Arc;

use block_dev::BlockDevice;
use clap::Parser;
use log::LevelFilter;
use sofs::MkfsOptions;
use sofs_fuse::BlockFile;
use typed_bytesize::ByteSizeIec;

use self::cli::Cli;

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    let level = if cli.quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let block_file = match cli.size {
        Some(mib) => BlockFile::create(&cli.device, ByteSizeIec::mib(mib).0)?,
        None => BlockFile::open(&cli.device)?,
    };
    let dev: Arc<dyn BlockDevice> = Arc::new(block_file);

    let opts = MkfsOptions {
        name: cli.name,
        inodes: cli.inodes,
        cluster_blocks: cli.cluster_blocks,
        zero: cli.zero,
        ..Default::default()
    };
    let sb = sofs::format(dev, &opts).map_err(io::Error::other)?;

    if !cli.quiet {
        println!(
            "{:?}: {} inodes, {} clusters of {} bytes, {} free",
            sb.name(),
            sb.itotal,
            sb.ctotal,
            sb.bytes_per_cluster(),
            sb.cfree
        );
    }
    Ok(())
}
