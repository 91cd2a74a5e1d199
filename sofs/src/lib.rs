//! # SOFS 文件系统
//!
//! 自下而上分为：
//!
//! 1. 磁盘层：[`RawDisk`] 以块、簇为单位读写 [`BlockDevice`]
//! 2. 布局层：超级块、inode、目录项在磁盘上的编码
//! 3. 管理层：超级块、inode 表、空闲 inode 链表与空闲簇表（FCT）
//! 4. 文件层：文件簇寻址（直接、一级间接、二级间接）
//! 5. 目录层：目录项增删改查与路径解析
//! 6. 接口层：[`Volume`] 上类 POSIX 的文件操作
//!
//! [`BlockDevice`]: block_dev::BlockDevice

mod dir;
mod disk;
mod file_cluster;
mod freelist;
mod itable;
pub mod layout;
mod mkfs;
pub mod path;
mod posix;
mod reference;
mod sb;
mod volume;

use std::time::{SystemTime, UNIX_EPOCH};

pub use self::{
    disk::RawDisk,
    itable::{AccessFlag, InodeHandle},
    layout::{DirEntry, FctCache, Inode, InodeKind, InodeState, MountState, SuperBlock},
    mkfs::{MkfsOptions, format},
    posix::StatFs,
    reference::{ClusterId, InodeId, NULL_REFERENCE},
    sb::SuperBlockDealer,
    volume::{Credentials, Volume},
};

pub type Result<T> = core::result::Result<T, vfs::Error>;

/// 块大小
pub const BLOCK_SIZE: usize = 512;
/// 格式化完成后的魔数
pub const MAGIC: u16 = 0x50F5;
pub const VERSION: u16 = 0x2016;
/// 超级块中卷名的容量，含结尾的 NUL
pub const VOLUME_NAME_SIZE: usize = 30;
/// 每块 inode 数
pub const IPB: usize = BLOCK_SIZE / layout::INODE_SIZE;
/// 每块目录项数
pub const DPB: usize = BLOCK_SIZE / layout::DIR_ENTRY_SIZE;
/// 每块簇引用数
pub const RPB: usize = BLOCK_SIZE / size_of::<u32>();
/// 空闲簇缓存的容量
pub const FCT_CACHE_SIZE: usize = 50;

/**** 文件簇索引 ****/
pub const N_DIRECT: usize = 5;
pub const N_INDIRECT: usize = 2;

/// 文件名最大长度，不含结尾的 NUL
pub const MAX_NAME: usize = 59;
pub const MAX_PATH: usize = 4096;

/// 每簇的最大块数
pub const MAX_CLUSTER_BLOCKS: u32 = 8;

/// 当前时间，秒
pub(crate) fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as u32)
}
