//! # 目录
//!
//! 目录文件的内容是紧凑排列的目录项数组，有效项数为 `size / 64`。
//! 删除时用最后一项填补空位。

use vfs::Error;

use crate::layout::DIR_ENTRY_SIZE;
use crate::path::Path;
use crate::{AccessFlag, DirEntry, InodeHandle, InodeId, MAX_NAME, MAX_PATH, Result, Volume};

impl Volume {
    pub(crate) fn require_dir(&self, ih: InodeHandle) -> Result<()> {
        if self.iget(ih)?.is_dir() {
            Ok(())
        } else {
            Err(Error::NotADirectory)
        }
    }

    /// 读取目录的全部有效项
    pub(crate) fn dir_entries(&self, ih: InodeHandle) -> Result<Vec<DirEntry>> {
        let sb = self.sb.get()?;
        let dpc = sb.dirents_per_cluster();
        let count = self.iget(ih)?.size as usize / DIR_ENTRY_SIZE;

        let mut entries = Vec::with_capacity(count);
        let mut buf = vec![0; sb.bytes_per_cluster()];
        for idx in 0..count {
            // 跨入新簇时才读盘
            if idx % dpc == 0 {
                self.read_file_cluster(ih, idx / dpc, &mut buf)?;
            }
            let offset = (idx % dpc) * DIR_ENTRY_SIZE;
            entries.push(DirEntry::decode(&buf[offset..offset + DIR_ENTRY_SIZE]));
        }
        Ok(entries)
    }

    /// 名为 `name` 的目录项的（下标，inode 号）
    fn find_entry(&self, ih: InodeHandle, name: &str) -> Result<Option<(usize, InodeId)>> {
        DirEntry::check_name(name)?;
        self.require_dir(ih)?;
        self.require_access(ih, AccessFlag::Exec)?;

        Ok(self
            .dir_entries(ih)?
            .into_iter()
            .enumerate()
            .find(|(_, entry)| entry.name == name)
            .and_then(|(idx, entry)| entry.inode.map(|n| (idx, n))))
    }

    pub fn get_dir_entry(&self, ih: InodeHandle, name: &str) -> Result<Option<InodeId>> {
        log::debug!("get_dir_entry({}, {name:?})", self.inumber(ih)?);
        Ok(self.find_entry(ih, name)?.map(|(_, n)| n))
    }

    /// 改写目录中第 `idx` 项
    fn put_entry(&mut self, ih: InodeHandle, idx: usize, entry: &DirEntry) -> Result<()> {
        let sb = self.sb.get()?;
        let dpc = sb.dirents_per_cluster();
        let mut buf = vec![0; sb.bytes_per_cluster()];
        self.read_file_cluster(ih, idx / dpc, &mut buf)?;
        let offset = (idx % dpc) * DIR_ENTRY_SIZE;
        entry.encode(&mut buf[offset..offset + DIR_ENTRY_SIZE]);
        self.write_file_cluster(ih, idx / dpc, &buf)
    }

    pub(crate) fn stamp(&mut self, ih: InodeHandle) -> Result<()> {
        let now = crate::now();
        let inode = self.iget_mut(ih)?;
        inode.mtime = now;
        inode.ctime = now;
        Ok(())
    }

    /// 在目录末尾追加目录项
    pub fn add_dir_entry(&mut self, ih: InodeHandle, name: &str, child: InodeId) -> Result<()> {
        log::debug!("add_dir_entry({}, {name:?}, {child})", self.inumber(ih)?);
        if self.find_entry(ih, name)?.is_some() {
            return Err(Error::AlreadyExists);
        }
        self.require_access(ih, AccessFlag::Write)?;

        let sb = self.sb.get()?;
        let dpc = sb.dirents_per_cluster();
        let max_clusters = sb.max_file_clusters();
        let bpc = sb.bytes_per_cluster();
        let idx = self.iget(ih)?.size as usize / DIR_ENTRY_SIZE;
        let fcn = idx / dpc;
        if fcn >= max_clusters {
            return Err(Error::FileTooLarge);
        }

        let mut buf = vec![0; bpc];
        if idx % dpc == 0 {
            // 新簇，其余项置空
            for raw in buf.chunks_exact_mut(DIR_ENTRY_SIZE) {
                DirEntry::empty().encode(raw);
            }
        } else {
            self.read_file_cluster(ih, fcn, &mut buf)?;
        }
        let offset = (idx % dpc) * DIR_ENTRY_SIZE;
        DirEntry::new(name, child).encode(&mut buf[offset..offset + DIR_ENTRY_SIZE]);
        self.write_file_cluster(ih, fcn, &buf)?;

        self.iget_mut(ih)?.size += DIR_ENTRY_SIZE as u32;
        self.stamp(ih)?;
        self.isave(ih)
    }

    /// 删除目录项，返回它指向的 inode 号
    pub fn delete_dir_entry(&mut self, ih: InodeHandle, name: &str) -> Result<InodeId> {
        log::debug!("delete_dir_entry({}, {name:?})", self.inumber(ih)?);
        let Some((idx, child)) = self.find_entry(ih, name)? else {
            return Err(Error::NotFound);
        };
        self.require_access(ih, AccessFlag::Write)?;

        let sb = self.sb.get()?;
        let dpc = sb.dirents_per_cluster();
        let bpc = sb.bytes_per_cluster();
        let last = self.iget(ih)?.size as usize / DIR_ENTRY_SIZE - 1;

        let mut buf = vec![0; bpc];
        self.read_file_cluster(ih, last / dpc, &mut buf)?;
        let last_offset = (last % dpc) * DIR_ENTRY_SIZE;
        if idx != last {
            let moved = DirEntry::decode(&buf[last_offset..last_offset + DIR_ENTRY_SIZE]);
            if idx / dpc == last / dpc {
                let offset = (idx % dpc) * DIR_ENTRY_SIZE;
                moved.encode(&mut buf[offset..offset + DIR_ENTRY_SIZE]);
            } else {
                self.put_entry(ih, idx, &moved)?;
            }
        }
        DirEntry::empty().encode(&mut buf[last_offset..last_offset + DIR_ENTRY_SIZE]);

        if last % dpc == 0 {
            // 最后一簇已无有效项
            self.free_file_clusters(ih, last / dpc)?;
        } else {
            self.write_file_cluster(ih, last / dpc, &buf)?;
        }

        self.iget_mut(ih)?.size -= DIR_ENTRY_SIZE as u32;
        self.stamp(ih)?;
        self.isave(ih)?;
        Ok(child)
    }

    /// 原地改名
    pub fn rename_dir_entry(&mut self, ih: InodeHandle, name: &str, new_name: &str) -> Result<()> {
        log::debug!(
            "rename_dir_entry({}, {name:?}, {new_name:?})",
            self.inumber(ih)?
        );
        DirEntry::check_name(new_name)?;
        let Some((idx, child)) = self.find_entry(ih, name)? else {
            return Err(Error::NotFound);
        };
        if name == new_name {
            return Ok(());
        }
        if self.find_entry(ih, new_name)?.is_some() {
            return Err(Error::AlreadyExists);
        }
        self.require_access(ih, AccessFlag::Write)?;

        self.put_entry(ih, idx, &DirEntry::new(new_name, child))?;
        self.stamp(ih)?;
        self.isave(ih)
    }

    /// 新目录的首簇只含 `.` 与 `..`
    pub(crate) fn init_dir(&mut self, ih: InodeHandle, parent: InodeId) -> Result<()> {
        let n = self.inumber(ih)?;
        let mut buf = vec![0; self.sb.get()?.bytes_per_cluster()];
        for (i, raw) in buf.chunks_exact_mut(DIR_ENTRY_SIZE).enumerate() {
            let entry = match i {
                0 => DirEntry::new(".", n),
                1 => DirEntry::new("..", parent),
                _ => DirEntry::empty(),
            };
            entry.encode(raw);
        }
        self.write_file_cluster(ih, 0, &buf)?;
        self.iget_mut(ih)?.size = 2 * DIR_ENTRY_SIZE as u32;
        self.isave(ih)
    }

    /// 把改写 `..` 之类的内部修改落盘，不检查权限
    pub(crate) fn set_dir_entry_inode(
        &mut self,
        ih: InodeHandle,
        name: &str,
        child: InodeId,
    ) -> Result<()> {
        let Some(idx) = self
            .dir_entries(ih)?
            .iter()
            .position(|entry| entry.name == name)
        else {
            return Err(Error::NotFound);
        };
        self.put_entry(ih, idx, &DirEntry::new(name, child))
    }

    /// 解析绝对路径，逐级检查目录的执行权限
    pub fn traverse_path(&mut self, path: &str) -> Result<InodeId> {
        log::debug!("traverse_path({path:?})");
        if path.len() > MAX_PATH {
            return Err(Error::NameTooLong);
        }
        if !path.is_absolute() {
            return Err(Error::InvalidArgument);
        }

        let mut cur = InodeId::ROOT;
        for name in path.components() {
            if name.len() > MAX_NAME {
                return Err(Error::NameTooLong);
            }
            cur = self.with_inode(cur, |vol, ih| {
                vol.get_dir_entry(ih, name)?.ok_or(Error::NotFound)
            })?;
        }
        Ok(cur)
    }
}
