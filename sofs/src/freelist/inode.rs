use vfs::Error;

use crate::{Inode, InodeId, InodeKind, InodeState, Result, Volume};

impl Volume {
    /// 从空闲链表头部取出一个 inode 并初始化
    pub fn alloc_inode(&mut self, kind: InodeKind) -> Result<InodeId> {
        log::debug!("alloc_inode({kind:?})");
        let sb = self.sb.get()?;
        if sb.ifree == 0 {
            return Err(Error::NoSpace);
        }
        let Some(n) = sb.ihead else {
            log::error!("free inode list has no head but ifree = {}", sb.ifree);
            return Err(Error::InvalidFormat);
        };

        let cred = self.cred;
        self.with_inode(n, |vol, ih| {
            let InodeState::Free { next } = vol.iget(ih)?.state else {
                log::error!("inode {n} on the free list is in use");
                return Err(Error::InvalidFormat);
            };

            let sb = vol.sb.get_mut()?;
            sb.ifree -= 1;
            if sb.ifree == 0 {
                sb.ihead = None;
                sb.itail = None;
            } else {
                sb.ihead = next;
            }
            vol.sb.save(&vol.disk)?;

            *vol.iget_mut(ih)? = Inode::in_use(kind, cred.uid, cred.gid, crate::now());
            vol.isave(ih)
        })?;
        Ok(n)
    }

    /// 把 inode 归还到空闲链表尾部，已空闲时什么也不做
    pub fn free_inode(&mut self, n: InodeId) -> Result<()> {
        log::debug!("free_inode({n})");
        let sb = self.sb.get()?;
        if n == InodeId::ROOT || u32::from(n) >= sb.itotal {
            return Err(Error::InvalidArgument);
        }

        let freed = self.with_inode(n, |vol, ih| {
            let inode = vol.iget_mut(ih)?;
            if inode.is_free() {
                return Ok(false);
            }
            inode.state = InodeState::Free { next: None };
            vol.isave(ih)?;
            Ok(true)
        })?;
        if !freed {
            return Ok(());
        }

        match self.sb.get()?.itail {
            None => {
                let sb = self.sb.get_mut()?;
                sb.ihead = Some(n);
            }
            Some(tail) => self.with_inode(tail, |vol, ih| {
                vol.iget_mut(ih)?.state = InodeState::Free { next: Some(n) };
                vol.isave(ih)
            })?,
        }
        let sb = self.sb.get_mut()?;
        sb.itail = Some(n);
        sb.ifree += 1;
        self.sb.save(&self.disk)
    }
}
