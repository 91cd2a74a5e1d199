use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use block_dev::{BlockDevice, BlockError};
use sofs::BLOCK_SIZE;

/// 以镜像文件为存储的块设备
#[derive(Debug)]
pub struct BlockFile {
    inner: Mutex<File>,
    num_blocks: usize,
}

impl BlockFile {
    /// 文件长度必须是块大小的整数倍
    pub fn new(fd: File) -> io::Result<Self> {
        let len = fd.metadata()?.len();
        if len % BLOCK_SIZE as u64 != 0 {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("image size {len} is not a multiple of {BLOCK_SIZE}"),
            ));
        }
        Ok(Self {
            inner: Mutex::new(fd),
            num_blocks: (len / BLOCK_SIZE as u64) as usize,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let fd = OpenOptions::new().read(true).write(true).open(path)?;
        Self::new(fd)
    }

    /// 新建或覆盖镜像，长度为 `size` 字节
    pub fn create(path: impl AsRef<Path>, size: u64) -> io::Result<Self> {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        fd.set_len(size)?;
        Self::new(fd)
    }

    fn seek_to(file: &mut File, block_id: usize) -> Result<(), BlockError> {
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .map(|_| ())
            .map_err(|err| device_error(block_id, err))
    }

    fn check(&self, block_id: usize, len: usize) -> Result<(), BlockError> {
        if block_id >= self.num_blocks {
            return Err(BlockError::OutOfRange(block_id));
        }
        if len != BLOCK_SIZE {
            return Err(BlockError::ShortTransfer(block_id));
        }
        Ok(())
    }
}

fn device_error(block_id: usize, err: io::Error) -> BlockError {
    if err.kind() == ErrorKind::UnexpectedEof {
        return BlockError::ShortTransfer(block_id);
    }
    log::error!("block {block_id}: {err}");
    BlockError::Device
}

impl BlockDevice for BlockFile {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        self.check(block_id, buf.len())?;
        let mut file = self.inner.lock().map_err(|_| BlockError::Device)?;
        Self::seek_to(&mut file, block_id)?;
        file.read_exact(buf)
            .map_err(|err| device_error(block_id, err))
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError> {
        self.check(block_id, buf.len())?;
        let mut file = self.inner.lock().map_err(|_| BlockError::Device)?;
        Self::seek_to(&mut file, block_id)?;
        file.write_all(buf)
            .map_err(|err| device_error(block_id, err))
    }
}
