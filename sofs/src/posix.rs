//! # 接口层
//!
//! 以绝对路径为参数的类 POSIX 文件操作。
//! 所有打开的 inode 都经 [`Volume::with_inode`] 在返回前关闭。

use enumflags2::BitFlags;
use vfs::{DirEntryType, Error, Stat};

use crate::path::Path;
use crate::{AccessFlag, DirEntry, InodeHandle, InodeId, InodeKind, MAX_PATH, Result, Volume};

/// 卷的使用情况
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatFs {
    pub block_size: u64,
    /// 总簇数
    pub clusters: u64,
    pub free_clusters: u64,
    pub inodes: u64,
    pub free_inodes: u64,
    pub name_max: u64,
}

fn reject_dots(name: &str) -> Result<()> {
    match name {
        "." | ".." => Err(Error::InvalidArgument),
        _ => Ok(()),
    }
}

impl Volume {
    /// 解析父目录，返回（父目录 inode 号，文件名）
    fn split_path<'p>(&mut self, path: &'p str) -> Result<(InodeId, &'p str)> {
        if path.len() > MAX_PATH {
            return Err(Error::NameTooLong);
        }
        if !path.is_absolute() {
            return Err(Error::InvalidArgument);
        }
        let (dir, name) = path.parent_file();
        if name == "/" {
            return Err(Error::Busy);
        }
        DirEntry::check_name(name)?;
        Ok((self.traverse_path(dir)?, name))
    }

    fn file_size_limit(&self) -> Result<u64> {
        Ok(self.sb.get()?.max_file_size().min(u32::MAX as u64))
    }

    fn kind_of(&self, ih: InodeHandle) -> Result<InodeKind> {
        self.iget(ih)?.kind().ok_or(Error::InvalidFormat)
    }

    /// 在 `parent` 中新建 `name`，失败时回收已分配的 inode
    fn create_at(
        &mut self,
        parent: InodeId,
        name: &str,
        kind: InodeKind,
        perm: u16,
    ) -> Result<InodeId> {
        reject_dots(name)?;
        self.with_inode(parent, |vol, pih| {
            vol.require_dir(pih)?;
            if vol.get_dir_entry(pih, name)?.is_some() {
                return Err(Error::AlreadyExists);
            }
            vol.require_access(pih, AccessFlag::Exec | AccessFlag::Write)?;

            let n = vol.alloc_inode(kind)?;
            let init = vol.with_inode(n, |vol, ih| {
                vol.set_access(ih, perm)?;
                if kind == InodeKind::Directory {
                    vol.iget_mut(ih)?.refcount = 2;
                    vol.init_dir(ih, parent)?;
                } else {
                    vol.iget_mut(ih)?.refcount = 1;
                }
                vol.isave(ih)
            });
            if let Err(err) = init.and_then(|_| vol.add_dir_entry(pih, name, n)) {
                vol.release_inode(n)?;
                return Err(err);
            }

            if kind == InodeKind::Directory {
                vol.inc_refcount(pih)?;
                vol.isave(pih)?;
            }
            Ok(n)
        })
    }

    /// 释放 inode 的全部簇并归还 inode
    fn release_inode(&mut self, n: InodeId) -> Result<()> {
        self.with_inode(n, |vol, ih| {
            vol.iget_mut(ih)?.refcount = 0;
            vol.free_file_clusters(ih, 0)?;
            vol.iget_mut(ih)?.size = 0;
            vol.isave(ih)
        })?;
        self.free_inode(n)
    }

    /// 目录 `n` 只含 `.` 与 `..`
    fn require_empty_dir(&mut self, n: InodeId) -> Result<()> {
        self.with_inode(n, |vol, ih| {
            vol.require_dir(ih)?;
            if vol.iget(ih)?.size as usize > 2 * crate::layout::DIR_ENTRY_SIZE {
                return Err(Error::DirectoryNotEmpty);
            }
            Ok(())
        })
    }

    /// 删除 `parent` 中指向空目录 `n` 的目录项并回收该目录
    fn remove_dir_at(&mut self, pih: InodeHandle, name: &str, n: InodeId) -> Result<()> {
        self.require_empty_dir(n)?;
        self.delete_dir_entry(pih, name)?;
        self.dec_refcount(pih)?;
        self.isave(pih)?;
        self.release_inode(n)
    }

    /// 非目录 `n` 少了一个名字，链接数归零时回收
    fn drop_link(&mut self, n: InodeId) -> Result<()> {
        let gone = self.with_inode(n, |vol, ih| {
            let gone = vol.dec_refcount(ih)? == 0;
            vol.iget_mut(ih)?.ctime = crate::now();
            vol.isave(ih)?;
            Ok(gone)
        })?;
        if gone {
            self.release_inode(n)?;
        }
        Ok(())
    }

    /// 删除 `parent` 中指向非目录 `n` 的目录项，最后一个链接被删除时回收
    fn unlink_at(&mut self, pih: InodeHandle, name: &str, n: InodeId) -> Result<()> {
        let is_dir = self.with_inode(n, |vol, ih| Ok(vol.iget(ih)?.is_dir()))?;
        if is_dir {
            return Err(Error::IsADirectory);
        }
        self.delete_dir_entry(pih, name)?;
        self.drop_link(n)
    }

    /// 目录 `dir` 是否就是 `n` 或位于 `n` 之下；沿 `..` 上溯到根目录
    fn within(&mut self, dir: InodeId, n: InodeId) -> Result<bool> {
        let mut cur = dir;
        for _ in 0..self.sb.get()?.itotal {
            if cur == n {
                return Ok(true);
            }
            if cur == InodeId::ROOT {
                return Ok(false);
            }
            cur = self.with_inode(cur, |vol, ih| {
                vol.dir_entries(ih)?
                    .into_iter()
                    .find(|entry| entry.name == "..")
                    .and_then(|entry| entry.inode)
                    .ok_or(Error::InvalidFormat)
            })?;
        }
        log::error!("directory {dir} does not lead back to the root");
        Err(Error::InvalidFormat)
    }

    /**** 新建 ****/

    /// 新建普通文件
    pub fn mknod(&mut self, path: &str, perm: u16) -> Result<InodeId> {
        log::debug!("mknod({path:?}, {perm:#o})");
        let (parent, name) = self.split_path(path)?;
        self.create_at(parent, name, InodeKind::Regular, perm)
    }

    pub fn mkdir(&mut self, path: &str, perm: u16) -> Result<InodeId> {
        log::debug!("mkdir({path:?}, {perm:#o})");
        let (parent, name) = self.split_path(path).map_err(|err| match err {
            Error::Busy => Error::AlreadyExists,
            err => err,
        })?;
        self.create_at(parent, name, InodeKind::Directory, perm)
    }

    /// 新建指向 `target` 的符号链接，内容即目标路径
    pub fn symlink(&mut self, target: &str, path: &str) -> Result<InodeId> {
        log::debug!("symlink({target:?}, {path:?})");
        if target.is_empty() {
            return Err(Error::InvalidArgument);
        }
        if target.len() > MAX_PATH {
            return Err(Error::NameTooLong);
        }
        let (parent, name) = self.split_path(path)?;
        let n = self.create_at(parent, name, InodeKind::SymLink, 0o777)?;
        self.with_inode(n, |vol, ih| vol.write_at(ih, target.as_bytes(), 0))?;
        Ok(n)
    }

    pub fn link(&mut self, path: &str, new_path: &str) -> Result<()> {
        log::debug!("link({path:?}, {new_path:?})");
        let n = self.traverse_path(path)?;
        self.with_inode(n, |vol, ih| {
            let inode = vol.iget(ih)?;
            if inode.is_dir() {
                return Err(Error::NotPermitted);
            }
            if inode.refcount == u16::MAX {
                return Err(Error::TooManyLinks);
            }
            Ok(())
        })?;

        let (parent, name) = self.split_path(new_path).map_err(|err| match err {
            Error::Busy => Error::AlreadyExists,
            err => err,
        })?;
        reject_dots(name)?;
        self.with_inode(parent, |vol, pih| vol.add_dir_entry(pih, name, n))?;
        self.with_inode(n, |vol, ih| {
            vol.inc_refcount(ih)?;
            vol.iget_mut(ih)?.ctime = crate::now();
            vol.isave(ih)
        })
    }

    /**** 删除 ****/

    pub fn unlink(&mut self, path: &str) -> Result<()> {
        log::debug!("unlink({path:?})");
        let (parent, name) = self.split_path(path).map_err(|err| match err {
            Error::Busy => Error::IsADirectory,
            err => err,
        })?;
        reject_dots(name)?;
        self.with_inode(parent, |vol, pih| {
            let n = vol.get_dir_entry(pih, name)?.ok_or(Error::NotFound)?;
            vol.unlink_at(pih, name, n)
        })
    }

    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        log::debug!("rmdir({path:?})");
        let (parent, name) = self.split_path(path)?;
        reject_dots(name)?;
        self.with_inode(parent, |vol, pih| {
            let n = vol.get_dir_entry(pih, name)?.ok_or(Error::NotFound)?;
            vol.remove_dir_at(pih, name, n)
        })
    }

    /// 改名或移动，已存在的目标被替换；目录不能移入自己的子树
    ///
    /// 所有检查都在修改磁盘之前完成。
    pub fn rename(&mut self, path: &str, new_path: &str) -> Result<()> {
        log::debug!("rename({path:?}, {new_path:?})");
        let (old_parent, old_name) = self.split_path(path)?;
        let (new_parent, new_name) = self.split_path(new_path)?;
        reject_dots(old_name)?;
        reject_dots(new_name)?;

        /**** 检查 ****/
        let n = self.with_inode(old_parent, |vol, pih| {
            let n = vol.get_dir_entry(pih, old_name)?.ok_or(Error::NotFound)?;
            vol.require_access(pih, AccessFlag::Exec | AccessFlag::Write)?;
            Ok(n)
        })?;
        let target = self.with_inode(new_parent, |vol, pih| {
            let target = vol.get_dir_entry(pih, new_name)?;
            vol.require_access(pih, AccessFlag::Exec | AccessFlag::Write)?;
            Ok(target)
        })?;
        if target == Some(n) {
            // 两个名字已指向同一个 inode
            return Ok(());
        }

        let is_dir = self.with_inode(n, |vol, ih| Ok(vol.iget(ih)?.is_dir()))?;
        if is_dir && self.within(new_parent, n)? {
            return Err(Error::InvalidArgument);
        }
        let target_is_dir = match target {
            Some(target) => {
                let target_is_dir =
                    self.with_inode(target, |vol, ih| Ok(vol.iget(ih)?.is_dir()))?;
                match (is_dir, target_is_dir) {
                    (false, true) => return Err(Error::IsADirectory),
                    (true, false) => return Err(Error::NotADirectory),
                    (true, true) => self.require_empty_dir(target)?,
                    (false, false) => {}
                }
                target_is_dir
            }
            None => false,
        };
        let moves_dir = is_dir && old_parent != new_parent;
        if moves_dir && target.is_none() {
            let links = self.with_inode(new_parent, |vol, ih| Ok(vol.iget(ih)?.refcount))?;
            if links == u16::MAX {
                return Err(Error::TooManyLinks);
            }
        }

        /**** 修改目录项 ****/
        match target {
            Some(_) => self.with_inode(new_parent, |vol, pih| {
                vol.set_dir_entry_inode(pih, new_name, n)?;
                vol.stamp(pih)?;
                vol.isave(pih)
            })?,
            None if old_parent == new_parent => {
                self.with_inode(old_parent, |vol, pih| {
                    vol.rename_dir_entry(pih, old_name, new_name)
                })?;
            }
            None => self.with_inode(new_parent, |vol, pih| vol.add_dir_entry(pih, new_name, n))?,
        }
        if target.is_some() || old_parent != new_parent {
            self.with_inode(old_parent, |vol, pih| {
                vol.delete_dir_entry(pih, old_name).map(|_| ())
            })?;
        }

        /**** 回收被替换的目标，修正链接数 ****/
        if let Some(target) = target {
            if target_is_dir {
                self.with_inode(new_parent, |vol, pih| {
                    vol.dec_refcount(pih)?;
                    vol.isave(pih)
                })?;
                self.release_inode(target)?;
            } else {
                self.drop_link(target)?;
            }
        }
        if moves_dir {
            self.with_inode(new_parent, |vol, pih| {
                vol.inc_refcount(pih)?;
                vol.isave(pih)
            })?;
            self.with_inode(old_parent, |vol, pih| {
                vol.dec_refcount(pih)?;
                vol.isave(pih)
            })?;
        }
        self.with_inode(n, |vol, ih| {
            if moves_dir {
                vol.set_dir_entry_inode(ih, "..", new_parent)?;
            }
            vol.iget_mut(ih)?.ctime = crate::now();
            vol.isave(ih)
        })
    }

    /**** 读写 ****/

    /// 从 `pos` 读取，不检查权限
    pub(crate) fn read_at(&mut self, ih: InodeHandle, buf: &mut [u8], pos: u64) -> Result<usize> {
        let size = self.iget(ih)?.size as u64;
        if pos >= size {
            return Ok(0);
        }
        let len = buf.len().min((size - pos) as usize);
        let bpc = self.sb.get()?.bytes_per_cluster();

        let mut cluster = vec![0; bpc];
        let mut done = 0;
        while done < len {
            let at = pos as usize + done;
            let (fcn, offset) = (at / bpc, at % bpc);
            let chunk = (bpc - offset).min(len - done);
            self.read_file_cluster(ih, fcn, &mut cluster)?;
            buf[done..done + chunk].copy_from_slice(&cluster[offset..offset + chunk]);
            done += chunk;
        }

        self.iget_mut(ih)?.touch(crate::now());
        self.isave(ih)?;
        Ok(len)
    }

    /// 写入到 `pos`，文件大小只增不减；不检查权限
    pub(crate) fn write_at(&mut self, ih: InodeHandle, buf: &[u8], pos: u64) -> Result<usize> {
        let end = pos + buf.len() as u64;
        if end > self.file_size_limit()? {
            return Err(Error::FileTooLarge);
        }
        let bpc = self.sb.get()?.bytes_per_cluster();

        let mut cluster = vec![0; bpc];
        let mut done = 0;
        while done < buf.len() {
            let at = pos as usize + done;
            let (fcn, offset) = (at / bpc, at % bpc);
            let chunk = (bpc - offset).min(buf.len() - done);
            if chunk < bpc {
                self.read_file_cluster(ih, fcn, &mut cluster)?;
            }
            cluster[offset..offset + chunk].copy_from_slice(&buf[done..done + chunk]);
            self.write_file_cluster(ih, fcn, &cluster)?;
            done += chunk;
        }

        let now = crate::now();
        let inode = self.iget_mut(ih)?;
        inode.size = inode.size.max(end as u32);
        inode.mtime = now;
        inode.ctime = now;
        self.isave(ih)?;
        Ok(buf.len())
    }

    pub fn read(&mut self, path: &str, buf: &mut [u8], pos: u64) -> Result<usize> {
        log::debug!("read({path:?}, {}, {pos})", buf.len());
        let n = self.traverse_path(path)?;
        self.with_inode(n, |vol, ih| {
            if vol.iget(ih)?.is_dir() {
                return Err(Error::IsADirectory);
            }
            vol.require_access(ih, AccessFlag::Read)?;
            vol.read_at(ih, buf, pos)
        })
    }

    pub fn write(&mut self, path: &str, buf: &[u8], pos: u64) -> Result<usize> {
        log::debug!("write({path:?}, {}, {pos})", buf.len());
        let n = self.traverse_path(path)?;
        self.with_inode(n, |vol, ih| {
            if vol.iget(ih)?.is_dir() {
                return Err(Error::IsADirectory);
            }
            vol.require_access(ih, AccessFlag::Write)?;
            vol.write_at(ih, buf, pos)
        })
    }

    /// 截断或稀疏地扩展到 `len` 字节
    pub fn truncate(&mut self, path: &str, len: u64) -> Result<()> {
        log::debug!("truncate({path:?}, {len})");
        let n = self.traverse_path(path)?;
        self.with_inode(n, |vol, ih| {
            if vol.iget(ih)?.is_dir() {
                return Err(Error::IsADirectory);
            }
            vol.require_access(ih, AccessFlag::Write)?;
            if len > vol.file_size_limit()? {
                return Err(Error::FileTooLarge);
            }

            let bpc = vol.sb.get()?.bytes_per_cluster();
            let len = len as usize;
            if len < vol.iget(ih)?.size as usize {
                vol.free_file_clusters(ih, len.div_ceil(bpc))?;
                // 最后一个簇中新结尾之后的部分清零
                if len % bpc != 0 && vol.get_file_cluster(ih, len / bpc)?.is_some() {
                    let mut cluster = vec![0; bpc];
                    vol.read_file_cluster(ih, len / bpc, &mut cluster)?;
                    cluster[len % bpc..].fill(0);
                    vol.write_file_cluster(ih, len / bpc, &cluster)?;
                }
            }

            let now = crate::now();
            let inode = vol.iget_mut(ih)?;
            inode.size = len as u32;
            inode.mtime = now;
            inode.ctime = now;
            vol.isave(ih)
        })
    }

    pub fn readlink(&mut self, path: &str) -> Result<String> {
        log::debug!("readlink({path:?})");
        let n = self.traverse_path(path)?;
        self.with_inode(n, |vol, ih| {
            if vol.iget(ih)?.kind() != Some(InodeKind::SymLink) {
                return Err(Error::InvalidArgument);
            }
            let mut buf = vec![0; vol.iget(ih)?.size as usize];
            let len = vol.read_at(ih, &mut buf, 0)?;
            buf.truncate(len);
            String::from_utf8(buf).map_err(|_| Error::InvalidFormat)
        })
    }

    /**** 目录与属性 ****/

    /// 从第 `at` 项开始至多读取 `count` 个目录项
    pub fn readdir(&mut self, path: &str, at: usize, count: usize) -> Result<Vec<vfs::DirEntry>> {
        log::debug!("readdir({path:?}, {at}, {count})");
        let n = self.traverse_path(path)?;
        self.with_inode(n, |vol, ih| {
            vol.require_dir(ih)?;
            vol.require_access(ih, AccessFlag::Read)?;

            vol.dir_entries(ih)?
                .into_iter()
                .skip(at)
                .take(count)
                .filter_map(|entry| Some((entry.inode?, entry.name)))
                .map(|(child, name)| {
                    let ty = vol.with_inode(child, |vol, ih| vol.kind_of(ih))?;
                    Ok(vfs::DirEntry {
                        inode: u32::from(child) as u64,
                        ty: DirEntryType::from(ty),
                        name,
                    })
                })
                .collect()
        })
    }

    pub fn stat(&mut self, path: &str) -> Result<Stat> {
        log::debug!("stat({path:?})");
        let n = self.traverse_path(path)?;
        let sb = self.sb.get()?;
        let (bpc, csize) = (sb.bytes_per_cluster() as u64, sb.csize as u64);
        self.with_inode(n, |vol, ih| {
            let kind = vol.kind_of(ih)?;
            let inode = vol.iget(ih)?;
            let atime = match inode.state {
                crate::InodeState::InUse { atime } => atime,
                crate::InodeState::Free { .. } => return Err(Error::InvalidFormat),
            };
            Ok(Stat {
                ino: u32::from(n) as u64,
                mode: kind.into(),
                perm: inode.perm(),
                links: inode.refcount,
                uid: inode.owner,
                gid: inode.group,
                size: inode.size as u64,
                block_size: bpc,
                blocks: inode.csize as u64 * csize,
                atime,
                mtime: inode.mtime,
                ctime: inode.ctime,
            })
        })
    }

    pub fn statfs(&self) -> Result<StatFs> {
        let sb = self.sb.get()?;
        Ok(StatFs {
            block_size: sb.bytes_per_cluster() as u64,
            clusters: sb.ctotal as u64,
            free_clusters: sb.cfree as u64,
            inodes: sb.itotal as u64,
            free_inodes: sb.ifree as u64,
            name_max: crate::MAX_NAME as u64,
        })
    }

    /// 调用者对 `path` 是否拥有 `access` 权限
    pub fn access(&mut self, path: &str, access: BitFlags<AccessFlag>) -> Result<bool> {
        let n = self.traverse_path(path)?;
        self.with_inode(n, |vol, ih| vol.check_access(ih, access))
    }

    /// 只有属主与 root 可以修改权限
    pub fn chmod(&mut self, path: &str, perm: u16) -> Result<()> {
        log::debug!("chmod({path:?}, {perm:#o})");
        let n = self.traverse_path(path)?;
        let cred = self.cred;
        self.with_inode(n, |vol, ih| {
            if cred.uid != 0 && cred.uid != vol.iget(ih)?.owner {
                return Err(Error::NotPermitted);
            }
            vol.set_access(ih, perm)?;
            vol.isave(ih)
        })
    }

    /// 只有 root 可以修改属主
    pub fn chown(&mut self, path: &str, owner: u32, group: u32) -> Result<()> {
        log::debug!("chown({path:?}, {owner}, {group})");
        if self.cred.uid != 0 {
            return Err(Error::NotPermitted);
        }
        let n = self.traverse_path(path)?;
        self.with_inode(n, |vol, ih| {
            let inode = vol.iget_mut(ih)?;
            inode.owner = owner;
            inode.group = group;
            inode.ctime = crate::now();
            vol.isave(ih)
        })
    }

    pub fn utime(&mut self, path: &str, atime: u32, mtime: u32) -> Result<()> {
        log::debug!("utime({path:?}, {atime}, {mtime})");
        let n = self.traverse_path(path)?;
        let cred = self.cred;
        self.with_inode(n, |vol, ih| {
            if cred.uid != 0 && cred.uid != vol.iget(ih)?.owner {
                return Err(Error::NotPermitted);
            }
            let inode = vol.iget_mut(ih)?;
            inode.touch(atime);
            inode.mtime = mtime;
            vol.isave(ih)
        })
    }
}
