use super::{Reader, Writer};
use crate::reference::{decode, encode};
use crate::{ClusterId, InodeId, N_DIRECT, N_INDIRECT};

pub const INODE_SIZE: usize = 64;

/// `mode` 中标记空闲 inode 的位
pub const INODE_FREE: u16 = 0o1000;
/// 权限位，不含空闲标记
pub const PERM_MASK: u16 = 0o6777;

const S_IFMT: u16 = 0o170000;
const S_IFDIR: u16 = 0o040000;
const S_IFREG: u16 = 0o100000;
const S_IFLNK: u16 = 0o120000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    Directory,
    Regular,
    SymLink,
}

impl InodeKind {
    pub fn bits(self) -> u16 {
        match self {
            InodeKind::Directory => S_IFDIR,
            InodeKind::Regular => S_IFREG,
            InodeKind::SymLink => S_IFLNK,
        }
    }

    pub fn from_mode(mode: u16) -> Option<Self> {
        match mode & S_IFMT {
            S_IFDIR => Some(InodeKind::Directory),
            S_IFREG => Some(InodeKind::Regular),
            S_IFLNK => Some(InodeKind::SymLink),
            _ => None,
        }
    }
}

impl From<InodeKind> for vfs::DirEntryType {
    fn from(kind: InodeKind) -> Self {
        match kind {
            InodeKind::Directory => vfs::DirEntryType::Directory,
            InodeKind::Regular => vfs::DirEntryType::Regular,
            InodeKind::SymLink => vfs::DirEntryType::SymLink,
        }
    }
}

/// 磁盘上 `atime` 与 `next` 共用一个字段，由空闲标记区分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeState {
    InUse {
        /// 最后访问时间
        atime: u32,
    },
    Free {
        /// 空闲链表中的下一个 inode
        next: Option<InodeId>,
    },
}

/// 磁盘上的 inode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    /// 类型与权限，不含空闲标记
    pub mode: u16,
    /// 硬链接数
    pub refcount: u16,
    pub owner: u32,
    pub group: u32,
    /// 文件字节数
    pub size: u32,
    /// 占用的簇数，含引用簇
    pub csize: u32,
    pub state: InodeState,
    /// 最后修改 inode 的时间
    pub ctime: u32,
    /// 最后修改数据的时间
    pub mtime: u32,

    /**** 直接索引 ****/
    pub d: [Option<ClusterId>; N_DIRECT],

    /**** 一级间接索引 ****/
    pub i1: [Option<ClusterId>; N_INDIRECT],

    /**** 二级间接索引 ****/
    pub i2: Option<ClusterId>,
}

impl Inode {
    /// 空闲链表中的 inode
    pub fn free(next: Option<InodeId>) -> Self {
        Self {
            mode: 0,
            refcount: 0,
            owner: 0,
            group: 0,
            size: 0,
            csize: 0,
            state: InodeState::Free { next },
            ctime: 0,
            mtime: 0,
            d: [None; N_DIRECT],
            i1: [None; N_INDIRECT],
            i2: None,
        }
    }

    /// 刚分配的 inode，三个时间戳都为 `now`
    pub fn in_use(kind: InodeKind, owner: u32, group: u32, now: u32) -> Self {
        Self {
            mode: kind.bits(),
            owner,
            group,
            state: InodeState::InUse { atime: now },
            ctime: now,
            mtime: now,
            ..Self::free(None)
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self.state, InodeState::Free { .. })
    }

    pub fn kind(&self) -> Option<InodeKind> {
        InodeKind::from_mode(self.mode)
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == Some(InodeKind::Directory)
    }

    pub fn perm(&self) -> u16 {
        self.mode & PERM_MASK
    }

    pub fn touch(&mut self, now: u32) {
        if let InodeState::InUse { atime } = &mut self.state {
            *atime = now;
        }
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut r = Reader::new(buf);
        let raw_mode = r.u16();
        let refcount = r.u16();
        let owner = r.u32();
        let group = r.u32();
        let size = r.u32();
        let csize = r.u32();
        let shared = r.u32();
        let state = if raw_mode & INODE_FREE != 0 {
            InodeState::Free {
                next: decode(shared),
            }
        } else {
            InodeState::InUse { atime: shared }
        };
        let ctime = r.u32();
        let mtime = r.u32();
        let mut d = [None; N_DIRECT];
        for slot in &mut d {
            *slot = decode(r.u32());
        }
        let mut i1 = [None; N_INDIRECT];
        for slot in &mut i1 {
            *slot = decode(r.u32());
        }
        Self {
            mode: raw_mode & !INODE_FREE,
            refcount,
            owner,
            group,
            size,
            csize,
            state,
            ctime,
            mtime,
            d,
            i1,
            i2: decode(r.u32()),
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        let mut w = Writer::new(buf);
        let (mode, shared) = match self.state {
            InodeState::InUse { atime } => (self.mode, atime),
            InodeState::Free { next } => (self.mode | INODE_FREE, encode(next)),
        };
        w.u16(mode);
        w.u16(self.refcount);
        w.u32(self.owner);
        w.u32(self.group);
        w.u32(self.size);
        w.u32(self.csize);
        w.u32(shared);
        w.u32(self.ctime);
        w.u32(self.mtime);
        for r in self.d.iter().chain(&self.i1).chain([&self.i2]) {
            w.u32(encode(*r));
        }
        debug_assert_eq!(w.position(), INODE_SIZE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_flag_shares_atime() {
        let inode = Inode::free(Some(InodeId::new(7)));
        let mut buf = [0; INODE_SIZE];
        inode.encode(&mut buf);
        assert_eq!(u16::from_le_bytes([buf[0], buf[1]]) & INODE_FREE, INODE_FREE);
        assert_eq!(&buf[20..24], &[7, 0, 0, 0]);
        assert_eq!(&buf[36..40], &[0xFF; 4]);
        assert_eq!(Inode::decode(&buf), inode);

        let mut inode = Inode::in_use(InodeKind::Regular, 1000, 100, 42);
        inode.mode |= 0o644;
        inode.d[0] = Some(ClusterId::new(12));
        inode.i2 = Some(ClusterId::new(13));
        inode.encode(&mut buf);
        let decoded = Inode::decode(&buf);
        assert_eq!(decoded.state, InodeState::InUse { atime: 42 });
        assert_eq!(decoded.kind(), Some(InodeKind::Regular));
        assert_eq!(decoded.perm(), 0o644);
        assert_eq!(decoded, inode);
    }

    #[test]
    fn kind_bits() {
        assert_eq!(InodeKind::from_mode(0o040755), Some(InodeKind::Directory));
        assert_eq!(InodeKind::from_mode(0o120777), Some(InodeKind::SymLink));
        assert_eq!(InodeKind::from_mode(0o010644), None);
    }
}
