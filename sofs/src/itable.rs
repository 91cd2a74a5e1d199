//! # inode 表
//!
//! 打开的 inode 在内存中只有一份副本，按打开者计数；
//! 计数归零时写回磁盘并换出。

use enumflags2::{BitFlags, bitflags};
use vfs::Error;

use crate::layout::{INODE_SIZE, PERM_MASK};
use crate::{BLOCK_SIZE, IPB, Inode, InodeId, Result, Volume};

/// 访问权限
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessFlag {
    Exec = 0b001,
    Write = 0b010,
    Read = 0b100,
}

/// 打开的 inode 在表中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeHandle(usize);

#[derive(Debug)]
struct Slot {
    number: InodeId,
    inode: Inode,
    /// 打开者数
    usecount: u32,
}

#[derive(Debug, Default)]
pub(crate) struct InodeTable {
    slots: Vec<Option<Slot>>,
}

impl InodeTable {
    fn find(&self, n: InodeId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|s| s.number == n))
    }

    fn insert(&mut self, slot: Slot) -> usize {
        match self.slots.iter().position(Option::is_none) {
            Some(i) => {
                self.slots[i] = Some(slot);
                i
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        }
    }

    fn slot(&self, ih: InodeHandle) -> Result<&Slot> {
        self.slots
            .get(ih.0)
            .and_then(Option::as_ref)
            .ok_or(Error::BadDescriptor)
    }

    fn slot_mut(&mut self, ih: InodeHandle) -> Result<&mut Slot> {
        self.slots
            .get_mut(ih.0)
            .and_then(Option::as_mut)
            .ok_or(Error::BadDescriptor)
    }

    /// 当前打开的 inode 数
    pub fn open_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}

impl Volume {
    /// inode 在 inode 表中的（块号，块内偏移）
    fn inode_pos(&self, n: InodeId) -> Result<(u32, usize)> {
        let sb = self.sb.get()?;
        if u32::from(n) >= sb.itotal {
            return Err(Error::InvalidArgument);
        }
        let block = sb.itstart + (n.index() / IPB) as u32;
        Ok((block, (n.index() % IPB) * INODE_SIZE))
    }

    pub fn iopen(&mut self, n: InodeId) -> Result<InodeHandle> {
        let (block, offset) = self.inode_pos(n)?;
        if let Some(i) = self.itable.find(n) {
            self.itable.slots[i]
                .as_mut()
                .ok_or(Error::BadDescriptor)?
                .usecount += 1;
            return Ok(InodeHandle(i));
        }

        let mut buf = [0; BLOCK_SIZE];
        self.disk.read_block(block, &mut buf)?;
        let inode = Inode::decode(&buf[offset..offset + INODE_SIZE]);
        let i = self.itable.insert(Slot {
            number: n,
            inode,
            usecount: 1,
        });
        Ok(InodeHandle(i))
    }

    pub fn iget(&self, ih: InodeHandle) -> Result<&Inode> {
        Ok(&self.itable.slot(ih)?.inode)
    }

    pub fn iget_mut(&mut self, ih: InodeHandle) -> Result<&mut Inode> {
        Ok(&mut self.itable.slot_mut(ih)?.inode)
    }

    pub fn inumber(&self, ih: InodeHandle) -> Result<InodeId> {
        Ok(self.itable.slot(ih)?.number)
    }

    /// 写回磁盘，读改写所在的块
    pub fn isave(&self, ih: InodeHandle) -> Result<()> {
        let slot = self.itable.slot(ih)?;
        let (block, offset) = self.inode_pos(slot.number)?;
        let mut buf = [0; BLOCK_SIZE];
        self.disk.read_block(block, &mut buf)?;
        slot.inode.encode(&mut buf[offset..offset + INODE_SIZE]);
        self.disk.write_block(block, &buf)
    }

    pub fn iclose(&mut self, ih: InodeHandle) -> Result<()> {
        let slot = self.itable.slot_mut(ih)?;
        slot.usecount -= 1;
        if slot.usecount == 0 {
            self.isave(ih)?;
            self.itable.slots[ih.0] = None;
        }
        Ok(())
    }

    /// 打开 `n` 并执行 `f`，无论成败都会关闭
    pub fn with_inode<T>(
        &mut self,
        n: InodeId,
        f: impl FnOnce(&mut Self, InodeHandle) -> Result<T>,
    ) -> Result<T> {
        let ih = self.iopen(n)?;
        let res = f(self, ih);
        let closed = self.iclose(ih);
        let v = res?;
        closed?;
        Ok(v)
    }

    /// 写回并换出所有打开的 inode
    pub(crate) fn iflush_all(&mut self) -> Result<()> {
        for i in 0..self.itable.slots.len() {
            if self.itable.slots[i].is_some() {
                self.isave(InodeHandle(i))?;
            }
        }
        if self.itable.open_count() > 0 {
            log::warn!("{} inodes still open", self.itable.open_count());
        }
        self.itable.slots.clear();
        Ok(())
    }

    /// 返回新的链接数
    pub fn inc_refcount(&mut self, ih: InodeHandle) -> Result<u16> {
        let inode = self.iget_mut(ih)?;
        inode.refcount = inode.refcount.checked_add(1).ok_or(Error::TooManyLinks)?;
        Ok(inode.refcount)
    }

    pub fn dec_refcount(&mut self, ih: InodeHandle) -> Result<u16> {
        let inode = self.iget_mut(ih)?;
        inode.refcount = inode.refcount.checked_sub(1).ok_or(Error::InvalidArgument)?;
        Ok(inode.refcount)
    }

    pub fn set_access(&mut self, ih: InodeHandle, perm: u16) -> Result<()> {
        let inode = self.iget_mut(ih)?;
        inode.mode = (inode.mode & !PERM_MASK) | (perm & PERM_MASK);
        inode.ctime = crate::now();
        Ok(())
    }

    pub fn get_access(&self, ih: InodeHandle) -> Result<u16> {
        Ok(self.iget(ih)?.perm())
    }

    /// root 总有读写权限，只要有任一执行位就有执行权限；
    /// 其他用户依次按属主、属组、其他人的权限位判断
    pub fn check_access(&self, ih: InodeHandle, access: BitFlags<AccessFlag>) -> Result<bool> {
        let inode = self.iget(ih)?;
        let perm = inode.perm();
        let cred = self.cred;

        if cred.uid == 0 {
            return Ok(!access.contains(AccessFlag::Exec) || perm & 0o111 != 0);
        }
        let bits = if cred.uid == inode.owner {
            perm >> 6
        } else if cred.gid == inode.group {
            perm >> 3
        } else {
            perm
        };
        let granted = BitFlags::<AccessFlag>::from_bits_truncate((bits & 0o7) as u8);
        Ok(granted.contains(access))
    }

    /// 检查权限，不满足时返回 [`Error::PermissionDenied`]
    pub(crate) fn require_access(
        &self,
        ih: InodeHandle,
        access: impl Into<BitFlags<AccessFlag>>,
    ) -> Result<()> {
        if self.check_access(ih, access.into())? {
            Ok(())
        } else {
            Err(Error::PermissionDenied)
        }
    }

    /// 空闲 inode 须带空闲标记；在用 inode 的类型须合法，
    /// 引用均在簇区范围内，且可达簇数等于 `csize`
    pub fn check_inode_consistency(&self, ih: InodeHandle) -> Result<()> {
        let inode = self.iget(ih)?;
        let n = self.inumber(ih)?;
        if inode.is_free() {
            return Ok(());
        }
        if inode.kind().is_none() {
            log::error!("inode {n} has unknown type {:#o}", inode.mode);
            return Err(Error::InvalidFormat);
        }
        let reachable = self.reachable_clusters(ih)?;
        if reachable != inode.csize {
            log::error!(
                "inode {n} reaches {reachable} clusters, csize is {}",
                inode.csize
            );
            return Err(Error::InvalidFormat);
        }
        Ok(())
    }
}
