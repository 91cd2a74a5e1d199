//! 超级块管理：内存中唯一的超级块副本

use vfs::Error;

use crate::{BLOCK_SIZE, RawDisk, Result, SuperBlock};

#[derive(Debug, Default)]
pub struct SuperBlockDealer {
    sb: Option<SuperBlock>,
}

impl SuperBlockDealer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从块 0 载入超级块
    pub fn open(&mut self, disk: &RawDisk) -> Result<()> {
        let mut buf = [0; BLOCK_SIZE];
        disk.read_block(0, &mut buf)?;
        self.sb = Some(SuperBlock::decode(&buf));
        Ok(())
    }

    /// 写回并释放副本
    pub fn close(&mut self, disk: &RawDisk) -> Result<()> {
        self.save(disk)?;
        self.sb.take().ok_or(Error::BadDescriptor)?;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.sb.is_some()
    }

    pub fn get(&self) -> Result<&SuperBlock> {
        self.sb.as_ref().ok_or(Error::BadDescriptor)
    }

    pub fn get_mut(&mut self) -> Result<&mut SuperBlock> {
        self.sb.as_mut().ok_or(Error::BadDescriptor)
    }

    /// 未打开时什么也不做
    pub fn save(&self, disk: &RawDisk) -> Result<()> {
        let Some(sb) = &self.sb else {
            return Ok(());
        };
        let mut buf = [0; BLOCK_SIZE];
        sb.encode(&mut buf);
        disk.write_block(0, &buf)
    }
}
