//! # 文件簇寻址
//!
//! 文件的第 `fcn` 个簇依次落在直接索引、一级间接索引、二级间接索引中。
//! 引用簇按需分配，分配时填满空引用。

use vfs::Error;

use crate::{ClusterId, InodeHandle, N_DIRECT, N_INDIRECT, Result, Volume};

/// 文件簇号在 inode 中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Direct(usize),
    /// `i1[outer]` 指向的引用簇中的第 `inner` 个引用
    Indirect { outer: usize, inner: usize },
    /// `i2` 指向的引用簇中第 `outer` 个引用簇内的第 `inner` 个引用
    DoubleIndirect { outer: usize, inner: usize },
}

fn locate(fcn: usize, rpc: usize) -> Result<Slot> {
    if fcn < N_DIRECT {
        return Ok(Slot::Direct(fcn));
    }
    let fcn = fcn - N_DIRECT;
    if fcn < N_INDIRECT * rpc {
        return Ok(Slot::Indirect {
            outer: fcn / rpc,
            inner: fcn % rpc,
        });
    }
    let fcn = fcn - N_INDIRECT * rpc;
    if fcn < rpc * rpc {
        return Ok(Slot::DoubleIndirect {
            outer: fcn / rpc,
            inner: fcn % rpc,
        });
    }
    Err(Error::InvalidArgument)
}

impl Volume {
    fn rpc(&self) -> Result<usize> {
        Ok(self.sb.get()?.refs_per_cluster())
    }

    /// 第 `fcn` 个文件簇对应的簇号，未分配时为 [`None`]
    pub fn get_file_cluster(&self, ih: InodeHandle, fcn: usize) -> Result<Option<ClusterId>> {
        let inode = self.iget(ih)?;
        Ok(match locate(fcn, self.rpc()?)? {
            Slot::Direct(k) => inode.d[k],
            Slot::Indirect { outer, inner } => match inode.i1[outer] {
                Some(r) => self.read_refs(r)?[inner],
                None => None,
            },
            Slot::DoubleIndirect { outer, inner } => {
                let Some(r2) = inode.i2 else {
                    return Ok(None);
                };
                match self.read_refs(r2)?[outer] {
                    Some(r1) => self.read_refs(r1)?[inner],
                    None => None,
                }
            }
        })
    }

    /// 分配一个填满空引用的引用簇
    fn alloc_ref_cluster(&mut self, ih: InodeHandle) -> Result<ClusterId> {
        let r = self.alloc_cluster()?;
        self.write_refs(r, &vec![None; self.rpc()?])?;
        self.iget_mut(ih)?.csize += 1;
        Ok(r)
    }

    /// 在引用簇 `r` 的第 `inner` 个位置挂上新的数据簇
    fn attach_data_cluster(
        &mut self,
        ih: InodeHandle,
        r: ClusterId,
        inner: usize,
    ) -> Result<ClusterId> {
        let mut refs = self.read_refs(r)?;
        if let Some(old) = refs[inner].take() {
            self.free_cluster(old)?;
            self.iget_mut(ih)?.csize -= 1;
        }
        let c = self.alloc_cluster()?;
        refs[inner] = Some(c);
        self.write_refs(r, &refs)?;
        self.iget_mut(ih)?.csize += 1;
        Ok(c)
    }

    /// 为第 `fcn` 个文件簇分配数据簇，沿途缺失的引用簇一并分配；
    /// 原有的数据簇先被释放
    pub fn alloc_file_cluster(&mut self, ih: InodeHandle, fcn: usize) -> Result<ClusterId> {
        log::debug!("alloc_file_cluster({}, {fcn})", self.inumber(ih)?);
        let c = match locate(fcn, self.rpc()?)? {
            Slot::Direct(k) => {
                if let Some(old) = self.iget_mut(ih)?.d[k].take() {
                    self.free_cluster(old)?;
                    self.iget_mut(ih)?.csize -= 1;
                }
                let c = self.alloc_cluster()?;
                let inode = self.iget_mut(ih)?;
                inode.d[k] = Some(c);
                inode.csize += 1;
                c
            }
            Slot::Indirect { outer, inner } => {
                let r = match self.iget(ih)?.i1[outer] {
                    Some(r) => r,
                    None => {
                        let r = self.alloc_ref_cluster(ih)?;
                        self.iget_mut(ih)?.i1[outer] = Some(r);
                        r
                    }
                };
                self.attach_data_cluster(ih, r, inner)?
            }
            Slot::DoubleIndirect { outer, inner } => {
                let r2 = match self.iget(ih)?.i2 {
                    Some(r2) => r2,
                    None => {
                        let r2 = self.alloc_ref_cluster(ih)?;
                        self.iget_mut(ih)?.i2 = Some(r2);
                        r2
                    }
                };
                let mut refs2 = self.read_refs(r2)?;
                let r1 = match refs2[outer] {
                    Some(r1) => r1,
                    None => {
                        let r1 = self.alloc_ref_cluster(ih)?;
                        refs2[outer] = Some(r1);
                        self.write_refs(r2, &refs2)?;
                        r1
                    }
                };
                self.attach_data_cluster(ih, r1, inner)?
            }
        };
        self.isave(ih)?;
        Ok(c)
    }

    /// 释放引用簇 `r` 中位置不小于 `from` 的数据簇；
    /// 返回引用簇是否因此变空并被释放
    fn free_refs_from(&mut self, ih: InodeHandle, r: ClusterId, from: usize) -> Result<bool> {
        let mut refs = self.read_refs(r)?;
        let mut freed = 0;
        for slot in &mut refs[from..] {
            if let Some(c) = slot.take() {
                self.free_cluster(c)?;
                freed += 1;
            }
        }
        self.iget_mut(ih)?.csize -= freed;

        if refs.iter().all(Option::is_none) {
            self.free_cluster(r)?;
            self.iget_mut(ih)?.csize -= 1;
            return Ok(true);
        }
        if freed > 0 {
            self.write_refs(r, &refs)?;
        }
        Ok(false)
    }

    /// 释放文件簇号不小于 `first` 的所有数据簇，以及因此变空的引用簇
    pub fn free_file_clusters(&mut self, ih: InodeHandle, first: usize) -> Result<()> {
        log::debug!("free_file_clusters({}, {first})", self.inumber(ih)?);
        let rpc = self.rpc()?;

        /**** 直接索引 ****/
        for k in first.min(N_DIRECT)..N_DIRECT {
            if let Some(c) = self.iget_mut(ih)?.d[k].take() {
                self.free_cluster(c)?;
                self.iget_mut(ih)?.csize -= 1;
            }
        }

        /**** 一级间接索引 ****/
        for outer in 0..N_INDIRECT {
            let base = N_DIRECT + outer * rpc;
            if self.iget(ih)?.csize == 0 {
                break;
            }
            let Some(r) = self.iget(ih)?.i1[outer] else {
                continue;
            };
            if first >= base + rpc {
                continue;
            }
            if self.free_refs_from(ih, r, first.saturating_sub(base))? {
                self.iget_mut(ih)?.i1[outer] = None;
            }
        }

        /**** 二级间接索引 ****/
        let base2 = N_DIRECT + N_INDIRECT * rpc;
        if let Some(r2) = self.iget(ih)?.i2 {
            if first < base2 + rpc * rpc {
                let mut refs2 = self.read_refs(r2)?;
                let mut changed = false;
                for outer in 0..rpc {
                    let base = base2 + outer * rpc;
                    if self.iget(ih)?.csize <= 1 {
                        break;
                    }
                    let Some(r1) = refs2[outer] else {
                        continue;
                    };
                    if first >= base + rpc {
                        continue;
                    }
                    if self.free_refs_from(ih, r1, first.saturating_sub(base))? {
                        refs2[outer] = None;
                        changed = true;
                    }
                }
                if refs2.iter().all(Option::is_none) {
                    self.free_cluster(r2)?;
                    let inode = self.iget_mut(ih)?;
                    inode.i2 = None;
                    inode.csize -= 1;
                } else if changed {
                    self.write_refs(r2, &refs2)?;
                }
            }
        }

        self.isave(ih)
    }

    /// 读取第 `fcn` 个文件簇，未分配时填零
    pub fn read_file_cluster(&self, ih: InodeHandle, fcn: usize, buf: &mut [u8]) -> Result<()> {
        if buf.len() != self.sb.get()?.bytes_per_cluster() {
            return Err(Error::InvalidArgument);
        }
        match self.get_file_cluster(ih, fcn)? {
            Some(c) => self.read_cluster(c, buf),
            None => {
                buf.fill(0);
                Ok(())
            }
        }
    }

    /// 写入第 `fcn` 个文件簇，未分配时先分配
    pub fn write_file_cluster(&mut self, ih: InodeHandle, fcn: usize, buf: &[u8]) -> Result<()> {
        if buf.len() != self.sb.get()?.bytes_per_cluster() {
            return Err(Error::InvalidArgument);
        }
        let c = match self.get_file_cluster(ih, fcn)? {
            Some(c) => c,
            None => self.alloc_file_cluster(ih, fcn)?,
        };
        self.write_cluster(c, buf)
    }

    /// 从 inode 可达的簇数，含引用簇
    pub(crate) fn reachable_clusters(&self, ih: InodeHandle) -> Result<u32> {
        let inode = self.iget(ih)?;
        let ctotal = self.sb.get()?.ctotal;
        let check = |c: ClusterId| -> Result<u32> {
            if u32::from(c) < ctotal {
                Ok(1)
            } else {
                log::error!("inode {} references cluster {c} out of range", self.inumber(ih)?);
                Err(Error::InvalidFormat)
            }
        };

        let mut count = 0;
        for c in inode.d.iter().flatten() {
            count += check(*c)?;
        }
        for r in inode.i1.iter().flatten() {
            count += check(*r)?;
            for c in self.read_refs(*r)?.iter().flatten() {
                count += check(*c)?;
            }
        }
        if let Some(r2) = inode.i2 {
            count += check(r2)?;
            for r1 in self.read_refs(r2)?.iter().flatten() {
                count += check(*r1)?;
                for c in self.read_refs(*r1)?.iter().flatten() {
                    count += check(*c)?;
                }
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_levels() {
        let rpc = 256;
        assert_eq!(locate(0, rpc), Ok(Slot::Direct(0)));
        assert_eq!(locate(4, rpc), Ok(Slot::Direct(4)));
        assert_eq!(locate(5, rpc), Ok(Slot::Indirect { outer: 0, inner: 0 }));
        assert_eq!(
            locate(5 + rpc, rpc),
            Ok(Slot::Indirect { outer: 1, inner: 0 })
        );
        assert_eq!(
            locate(5 + 2 * rpc + rpc + 3, rpc),
            Ok(Slot::DoubleIndirect { outer: 1, inner: 3 })
        );
        assert_eq!(
            locate(5 + 2 * rpc + rpc * rpc - 1, rpc),
            Ok(Slot::DoubleIndirect {
                outer: rpc - 1,
                inner: rpc - 1
            })
        );
        assert_eq!(locate(5 + 2 * rpc + rpc * rpc, rpc), Err(Error::InvalidArgument));
    }
}
