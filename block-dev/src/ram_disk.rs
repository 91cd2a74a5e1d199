use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::{BlockDevice, BlockError};

/// 内存中的块设备，块大小固定
#[derive(Debug)]
pub struct RamDisk {
    block_size: usize,
    data: Mutex<Vec<u8>>,
}

impl RamDisk {
    pub fn new(block_size: usize, num_blocks: usize) -> Self {
        Self {
            block_size,
            data: Mutex::new(vec![0; block_size * num_blocks]),
        }
    }

    fn range(&self, block_id: usize, len: usize) -> Result<core::ops::Range<usize>, BlockError> {
        if block_id >= self.num_blocks() {
            return Err(BlockError::OutOfRange(block_id));
        }
        if len != self.block_size {
            return Err(BlockError::ShortTransfer(block_id));
        }
        let start = block_id * self.block_size;
        Ok(start..start + len)
    }
}

impl BlockDevice for RamDisk {
    fn num_blocks(&self) -> usize {
        self.data.lock().len() / self.block_size
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        let range = self.range(block_id, buf.len())?;
        buf.copy_from_slice(&self.data.lock()[range]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError> {
        let range = self.range(block_id, buf.len())?;
        self.data.lock()[range].copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_back() {
        let disk = RamDisk::new(512, 4);
        assert_eq!(disk.num_blocks(), 4);

        let block = [0xAB; 512];
        disk.write_block(3, &block).unwrap();
        let mut buf = [0; 512];
        disk.read_block(3, &mut buf).unwrap();
        assert_eq!(buf, block);

        disk.read_block(2, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn bounds() {
        let disk = RamDisk::new(512, 2);
        let mut buf = [0; 512];
        assert_eq!(disk.read_block(2, &mut buf), Err(BlockError::OutOfRange(2)));
        assert_eq!(
            disk.write_block(0, &buf[..100]),
            Err(BlockError::ShortTransfer(0))
        );
    }
}
