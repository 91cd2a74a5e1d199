//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘、U盘、镜像文件等；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。

#![no_std]

extern crate alloc;

mod ram_disk;

use core::any::Any;

pub use self::ram_disk::RamDisk;

/// 块设备驱动特质
pub trait BlockDevice: Send + Sync + Any {
    /// 设备的总块数
    fn num_blocks(&self) -> usize;

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError>;

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("block {0} is out of range")]
    OutOfRange(usize),
    #[error("incomplete transfer on block {0}")]
    ShortTransfer(usize),
    #[error("device failure")]
    Device,
}
