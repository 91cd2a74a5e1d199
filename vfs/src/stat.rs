use crate::DirEntryType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Inode number
    pub ino: u64,
    pub mode: DirEntryType,
    /// 权限位，不含类型
    pub perm: u16,
    /// Hard links
    pub links: u16,
    pub uid: u32,
    pub gid: u32,
    /// File size
    pub size: u64,
    /// Optimal I/O block size
    pub block_size: u64,
    /// Occupying blocks
    pub blocks: u64,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
}
