//! 簇号与 inode 号
//!
//! 磁盘上以 [`NULL_REFERENCE`] 表示空引用，内存中一律为 [`None`]。

use derive_more::{Display, From, Into};

/// 磁盘上的空引用
pub const NULL_REFERENCE: u32 = u32::MAX;

/// 逻辑簇号，0 号簇为根目录的首簇
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into, Display)]
#[repr(transparent)]
pub struct ClusterId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into, Display)]
#[repr(transparent)]
pub struct InodeId(u32);

impl ClusterId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl InodeId {
    /// 根目录
    pub const ROOT: Self = Self(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

pub(crate) fn decode<T: From<u32>>(raw: u32) -> Option<T> {
    (raw != NULL_REFERENCE).then(|| T::from(raw))
}

pub(crate) fn encode<T: Into<u32>>(id: Option<T>) -> u32 {
    id.map_or(NULL_REFERENCE, Into::into)
}
