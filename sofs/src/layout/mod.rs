//! # 磁盘数据结构布局层
//!
//! 块 0 为超级块，随后是 inode 表，其余为簇区。
//! 所有整数以小端序存储。

mod dir_entry;
mod inode;
mod super_block;

pub use self::{
    dir_entry::{DIR_ENTRY_SIZE, DirEntry},
    inode::{INODE_FREE, INODE_SIZE, Inode, InodeKind, InodeState, PERM_MASK},
    super_block::{FCT_RECORD_SIZE, FctCache, MountState, SuperBlock},
};

/// 按字段顺序解码
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut raw = [0; N];
        raw.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        raw
    }

    pub fn u8(&mut self) -> u8 {
        self.bytes::<1>()[0]
    }

    pub fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.bytes())
    }

    pub fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.bytes())
    }
}

/// 按字段顺序编码
pub(crate) struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn bytes(&mut self, raw: &[u8]) {
        self.buf[self.pos..self.pos + raw.len()].copy_from_slice(raw);
        self.pos += raw.len();
    }

    pub fn u8(&mut self, v: u8) {
        self.bytes(&[v]);
    }

    pub fn u16(&mut self, v: u16) {
        self.bytes(&v.to_le_bytes());
    }

    pub fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

/// 簇引用数组的编解码，用于间接引用簇与 FCT 簇
pub(crate) mod refs {
    use crate::ClusterId;
    use crate::reference::{decode, encode};

    pub fn decode_all(buf: &[u8]) -> Vec<Option<ClusterId>> {
        buf.chunks_exact(4)
            .map(|raw| decode(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])))
            .collect()
    }

    pub fn encode_all(refs: &[Option<ClusterId>], buf: &mut [u8]) {
        for (r, raw) in refs.iter().zip(buf.chunks_exact_mut(4)) {
            raw.copy_from_slice(&encode(*r).to_le_bytes());
        }
    }
}
