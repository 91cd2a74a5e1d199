//! # 磁盘层
//!
//! 唯一接触块设备的组件，按物理块号读写块与簇。

use std::sync::Arc;

use block_dev::{BlockDevice, BlockError};
use vfs::Error;

use crate::{BLOCK_SIZE, Result};

/// 打开的块设备
#[derive(Default)]
pub struct RawDisk {
    dev: Option<Arc<dyn BlockDevice>>,
    /// 设备的总块数
    ntotal: u32,
}

fn io(err: BlockError) -> Error {
    log::error!("block device: {err}");
    Error::Io
}

impl RawDisk {
    pub fn new() -> Self {
        Self::default()
    }

    /// 打开设备，返回其总块数
    pub fn open(&mut self, dev: Arc<dyn BlockDevice>) -> Result<u32> {
        if self.dev.is_some() {
            return Err(Error::Busy);
        }
        let ntotal = u32::try_from(dev.num_blocks()).map_err(|_| Error::InvalidArgument)?;
        log::debug!("open raw disk with {ntotal} blocks");
        self.dev = Some(dev);
        self.ntotal = ntotal;
        Ok(ntotal)
    }

    pub fn close(&mut self) -> Result<()> {
        self.dev.take().ok_or(Error::BadDescriptor)?;
        self.ntotal = 0;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.dev.is_some()
    }

    pub fn num_blocks(&self) -> Result<u32> {
        self.dev()?;
        Ok(self.ntotal)
    }

    fn dev(&self) -> Result<&Arc<dyn BlockDevice>> {
        self.dev.as_ref().ok_or(Error::BadDescriptor)
    }

    pub fn read_block(&self, n: u32, buf: &mut [u8]) -> Result<()> {
        let dev = self.dev()?;
        if n >= self.ntotal || buf.len() != BLOCK_SIZE {
            return Err(Error::InvalidArgument);
        }
        dev.read_block(n as usize, buf).map_err(io)
    }

    pub fn write_block(&self, n: u32, buf: &[u8]) -> Result<()> {
        let dev = self.dev()?;
        if n >= self.ntotal || buf.len() != BLOCK_SIZE {
            return Err(Error::InvalidArgument);
        }
        dev.write_block(n as usize, buf).map_err(io)
    }

    /// 读取从物理块 `n` 开始的 `bpc` 个连续块
    pub fn read_cluster(&self, n: u32, buf: &mut [u8], bpc: u32) -> Result<()> {
        self.check_cluster(n, buf.len(), bpc)?;
        let dev = self.dev()?;
        for (i, block) in buf.chunks_exact_mut(BLOCK_SIZE).enumerate() {
            dev.read_block(n as usize + i, block).map_err(io)?;
        }
        Ok(())
    }

    pub fn write_cluster(&self, n: u32, buf: &[u8], bpc: u32) -> Result<()> {
        self.check_cluster(n, buf.len(), bpc)?;
        let dev = self.dev()?;
        for (i, block) in buf.chunks_exact(BLOCK_SIZE).enumerate() {
            dev.write_block(n as usize + i, block).map_err(io)?;
        }
        Ok(())
    }

    fn check_cluster(&self, n: u32, len: usize, bpc: u32) -> Result<()> {
        self.dev()?;
        if n >= self.ntotal || bpc == 0 || len != bpc as usize * BLOCK_SIZE {
            return Err(Error::InvalidArgument);
        }
        // 簇越过设备末尾
        if n as u64 + bpc as u64 > self.ntotal as u64 {
            log::error!("cluster at block {n} runs past the end of the device");
            return Err(Error::Io);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use block_dev::RamDisk;

    use super::*;

    #[test]
    fn open_close() {
        let mut disk = RawDisk::new();
        let dev: Arc<dyn BlockDevice> = Arc::new(RamDisk::new(BLOCK_SIZE, 16));
        assert_eq!(disk.open(dev.clone()), Ok(16));
        assert_eq!(disk.open(dev), Err(Error::Busy));
        assert_eq!(disk.close(), Ok(()));
        assert_eq!(disk.close(), Err(Error::BadDescriptor));

        let mut buf = [0; BLOCK_SIZE];
        assert_eq!(disk.read_block(0, &mut buf), Err(Error::BadDescriptor));
    }

    #[test]
    fn cluster_bounds() {
        let mut disk = RawDisk::new();
        disk.open(Arc::new(RamDisk::new(BLOCK_SIZE, 16))).unwrap();

        let data = vec![7; 2 * BLOCK_SIZE];
        disk.write_cluster(14, &data, 2).unwrap();
        let mut buf = vec![0; 2 * BLOCK_SIZE];
        disk.read_cluster(14, &mut buf, 2).unwrap();
        assert_eq!(buf, data);

        assert_eq!(disk.read_cluster(15, &mut buf, 2), Err(Error::Io));
        assert_eq!(disk.read_cluster(16, &mut buf, 2), Err(Error::InvalidArgument));
        assert_eq!(
            disk.read_cluster(0, &mut buf[..BLOCK_SIZE], 2),
            Err(Error::InvalidArgument)
        );
    }
}
