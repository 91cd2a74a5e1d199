use vfs::Error;

use crate::{ClusterId, Result, Volume};

impl Volume {
    /// 从头缓存取出一个空闲簇，缓存为空时先补充
    pub fn alloc_cluster(&mut self) -> Result<ClusterId> {
        log::debug!("alloc_cluster()");
        let sb = self.sb.get()?;
        if sb.cfree == 0 {
            return Err(Error::NoSpace);
        }
        if sb.chead.is_empty() {
            self.replenish()?;
        }

        let mut sb = self.sb.get()?.clone();
        let Some(c) = sb.chead.pop() else {
            log::error!("no free cluster reachable but cfree = {}", sb.cfree);
            return Err(Error::NoSpace);
        };
        sb.cfree -= 1;
        self.commit(sb)?;
        Ok(c)
    }

    /// 把簇放入尾缓存，缓存已满时先清空到 FCT
    pub fn free_cluster(&mut self, c: ClusterId) -> Result<()> {
        log::debug!("free_cluster({c})");
        if u32::from(c) >= self.sb.get()?.ctotal {
            return Err(Error::InvalidArgument);
        }
        if self.sb.get()?.ctail.is_full() {
            self.deplete()?;
        }

        let mut sb = self.sb.get()?.clone();
        sb.ctail.push(c);
        sb.cfree += 1;
        self.commit(sb)
    }
}
