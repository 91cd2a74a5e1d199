mod cli;

use std::fs;
use std::io;
use std::sync::Arc;

use block_dev::BlockDevice;
use clap::Parser;
use sofs::{Credentials, MkfsOptions, Volume};
use sofs_fuse::BlockFile;
use typed_bytesize::ByteSizeIec;

use self::cli::Cli;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    println!("source={:?}\nout_dir={:?}", cli.source, cli.out_dir);

    let image = cli.out_dir.join("fs.img");
    let dev: Arc<dyn BlockDevice> =
        Arc::new(BlockFile::create(&image, ByteSizeIec::mib(cli.size).0)?);
    sofs::format(dev.clone(), &MkfsOptions::default()).map_err(io::Error::other)?;
    let mut vol = Volume::mount(dev, Credentials::ROOT).map_err(io::Error::other)?;

    for entry in fs::read_dir(&cli.source)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            log::warn!("skip non UTF-8 file name {name:?}");
            continue;
        };

        log::info!("file={name:?}");
        let data = fs::read(entry.path())?;
        let path = format!("/{name}");
        vol.mknod(&path, 0o755).map_err(io::Error::other)?;
        vol.write(&path, &data, 0).map_err(io::Error::other)?;
    }

    vol.unmount().map_err(io::Error::other)
}
