//! # 卷
//!
//! [`Volume`] 持有磁盘、超级块、inode 表与调用者身份，
//! 所有修改操作都经由 `&mut Volume` 串行执行。

use std::sync::Arc;

use block_dev::BlockDevice;
use vfs::Error;

use crate::itable::InodeTable;
use crate::layout::refs;
use crate::{ClusterId, MAGIC, MountState, RawDisk, Result, SuperBlockDealer, VERSION};

/// 调用者身份，用于权限检查与新建 inode 的属主
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Credentials {
    pub uid: u32,
    pub gid: u32,
}

impl Credentials {
    pub const ROOT: Self = Self { uid: 0, gid: 0 };
}

pub struct Volume {
    pub(crate) disk: RawDisk,
    pub(crate) sb: SuperBlockDealer,
    pub(crate) itable: InodeTable,
    pub(crate) cred: Credentials,
}

impl Volume {
    /// 挂载已格式化的设备
    pub fn mount(dev: Arc<dyn BlockDevice>, cred: Credentials) -> Result<Self> {
        let mut disk = RawDisk::new();
        disk.open(dev)?;
        let mut sb = SuperBlockDealer::new();
        sb.open(&disk)?;

        let super_block = sb.get_mut()?;
        if super_block.magic != MAGIC || super_block.version != VERSION {
            log::error!(
                "bad magic {:#x} or version {:#x}",
                super_block.magic,
                super_block.version
            );
            return Err(Error::InvalidFormat);
        }
        super_block.check_consistency()?;
        if super_block.mstat == MountState::Dirty {
            log::warn!("volume {:?} was not properly unmounted", super_block.name());
        }
        super_block.mstat = MountState::Dirty;
        sb.save(&disk)?;
        log::info!("mounted volume {:?}", sb.get()?.name());

        Ok(Self {
            disk,
            sb,
            itable: InodeTable::default(),
            cred,
        })
    }

    /// 写回所有 inode，标记为已正确卸载
    pub fn unmount(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if !self.sb.is_open() {
            return Ok(());
        }
        self.iflush_all()?;
        self.sb.get_mut()?.mstat = MountState::Clean;
        self.sb.close(&self.disk)?;
        self.disk.close()
    }

    pub fn credentials(&self) -> Credentials {
        self.cred
    }

    pub fn set_credentials(&mut self, cred: Credentials) {
        self.cred = cred;
    }

    pub fn super_block(&self) -> Result<&crate::SuperBlock> {
        self.sb.get()
    }

    /**** 簇读写 ****/

    fn cluster_block(&self, c: ClusterId) -> Result<(u32, u32)> {
        let sb = self.sb.get()?;
        if u32::from(c) >= sb.ctotal {
            return Err(Error::InvalidArgument);
        }
        Ok((sb.cluster_block(c), sb.csize))
    }

    pub(crate) fn read_cluster(&self, c: ClusterId, buf: &mut [u8]) -> Result<()> {
        let (n, bpc) = self.cluster_block(c)?;
        self.disk.read_cluster(n, buf, bpc)
    }

    pub(crate) fn write_cluster(&self, c: ClusterId, buf: &[u8]) -> Result<()> {
        let (n, bpc) = self.cluster_block(c)?;
        self.disk.write_cluster(n, buf, bpc)
    }

    /// 读取引用簇
    pub(crate) fn read_refs(&self, c: ClusterId) -> Result<Vec<Option<ClusterId>>> {
        let mut buf = vec![0; self.sb.get()?.bytes_per_cluster()];
        self.read_cluster(c, &mut buf)?;
        Ok(refs::decode_all(&buf))
    }

    pub(crate) fn write_refs(&self, c: ClusterId, refs: &[Option<ClusterId>]) -> Result<()> {
        let mut buf = vec![0; self.sb.get()?.bytes_per_cluster()];
        refs::encode_all(refs, &mut buf);
        self.write_cluster(c, &buf)
    }

    /// 把内存中修改过的超级块写回
    pub(crate) fn commit(&mut self, sb: crate::SuperBlock) -> Result<()> {
        *self.sb.get_mut()? = sb;
        self.sb.save(&self.disk)
    }
}

impl Drop for Volume {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("failed to unmount volume: {err}");
        }
    }
}
