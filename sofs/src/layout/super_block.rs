use vfs::Error;

use super::{Reader, Writer};
use crate::reference::{decode, encode};
use crate::{
    BLOCK_SIZE, ClusterId, DPB, FCT_CACHE_SIZE, IPB, InodeId, MAGIC, MAX_CLUSTER_BLOCKS, N_DIRECT,
    N_INDIRECT, RPB, Result, VERSION, VOLUME_NAME_SIZE,
};

/// 一条 FCT 缓存记录在磁盘上的大小
pub const FCT_RECORD_SIZE: usize = (FCT_CACHE_SIZE + 4) * size_of::<u32>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MountState {
    /// 已正确卸载
    Clean = 0,
    /// 已挂载，或上次未正确卸载
    Dirty = 1,
}

/// 空闲簇的环形缓存，以及它在 FCT 链上对应的引用簇
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FctCache {
    pub refs: [Option<ClusterId>; FCT_CACHE_SIZE],
    /// 下一个入队位置
    pub in_idx: usize,
    /// 下一个出队位置
    pub out_idx: usize,
    /// 对应的 FCT 引用簇
    pub cluster: Option<ClusterId>,
    /// 引用簇内的读（头）或写（尾）位置
    pub cluster_idx: usize,
}

impl Default for FctCache {
    fn default() -> Self {
        Self {
            refs: [None; FCT_CACHE_SIZE],
            in_idx: 0,
            out_idx: 0,
            cluster: None,
            cluster_idx: 0,
        }
    }
}

impl FctCache {
    /// 出队位置为空即缓存为空
    pub fn is_empty(&self) -> bool {
        self.refs[self.out_idx].is_none()
    }

    /// 入队位置被占即缓存已满
    pub fn is_full(&self) -> bool {
        self.refs[self.in_idx].is_some()
    }

    pub fn len(&self) -> usize {
        self.refs.iter().flatten().count()
    }

    pub fn push(&mut self, c: ClusterId) {
        debug_assert!(!self.is_full());
        self.refs[self.in_idx] = Some(c);
        self.in_idx = (self.in_idx + 1) % FCT_CACHE_SIZE;
    }

    pub fn pop(&mut self) -> Option<ClusterId> {
        let c = self.refs[self.out_idx].take()?;
        self.out_idx = (self.out_idx + 1) % FCT_CACHE_SIZE;
        Some(c)
    }

    fn decode(r: &mut Reader) -> Self {
        let mut refs = [None; FCT_CACHE_SIZE];
        for slot in &mut refs {
            *slot = decode(r.u32());
        }
        Self {
            refs,
            in_idx: r.u32() as usize,
            out_idx: r.u32() as usize,
            cluster: decode(r.u32()),
            cluster_idx: r.u32() as usize,
        }
    }

    fn encode(&self, w: &mut Writer) {
        for slot in &self.refs {
            w.u32(encode(*slot));
        }
        w.u32(self.in_idx as u32);
        w.u32(self.out_idx as u32);
        w.u32(encode(self.cluster));
        w.u32(self.cluster_idx as u32);
    }
}

/// 超级块，位于块 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u16,
    pub version: u16,
    /// NUL 结尾的卷名
    pub name: [u8; VOLUME_NAME_SIZE],
    pub mstat: MountState,
    /// 每簇块数
    pub csize: u32,
    /// 总块数
    pub ntotal: u32,

    /**** inode 表 ****/
    pub itstart: u32,
    pub itsize: u32,
    pub itotal: u32,
    pub ifree: u32,
    pub ihead: Option<InodeId>,
    pub itail: Option<InodeId>,

    /**** 簇区 ****/
    pub czstart: u32,
    pub ctotal: u32,
    pub cfree: u32,
    /// FCT 链占用的簇数
    pub crefs: u32,
    pub chead: FctCache,
    pub ctail: FctCache,
}

impl SuperBlock {
    pub fn decode(buf: &[u8]) -> Self {
        let mut r = Reader::new(buf);
        Self {
            magic: r.u16(),
            version: r.u16(),
            name: r.bytes(),
            mstat: match r.u8() {
                0 => MountState::Clean,
                _ => MountState::Dirty,
            },
            csize: r.u8() as u32,
            ntotal: r.u32(),
            itstart: r.u32(),
            itsize: r.u32(),
            itotal: r.u32(),
            ifree: r.u32(),
            ihead: decode(r.u32()),
            itail: decode(r.u32()),
            czstart: r.u32(),
            ctotal: r.u32(),
            cfree: r.u32(),
            crefs: r.u32(),
            chead: FctCache::decode(&mut r),
            ctail: FctCache::decode(&mut r),
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        let mut w = Writer::new(buf);
        w.u16(self.magic);
        w.u16(self.version);
        w.bytes(&self.name);
        w.u8(self.mstat as u8);
        w.u8(self.csize as u8);
        for v in [
            self.ntotal,
            self.itstart,
            self.itsize,
            self.itotal,
            self.ifree,
            encode(self.ihead),
            encode(self.itail),
            self.czstart,
            self.ctotal,
            self.cfree,
            self.crefs,
        ] {
            w.u32(v);
        }
        self.chead.encode(&mut w);
        self.ctail.encode(&mut w);
        debug_assert_eq!(w.position(), BLOCK_SIZE);
    }

    pub fn name(&self) -> String {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..len]).into_owned()
    }

    /// 截断至 29 字节，保留 NUL
    pub fn set_name(&mut self, name: &str) {
        self.name = [0; VOLUME_NAME_SIZE];
        let mut len = name.len().min(VOLUME_NAME_SIZE - 1);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        self.name[..len].copy_from_slice(&name.as_bytes()[..len]);
    }

    /**** 几何参数 ****/

    /// 每簇字节数
    pub fn bytes_per_cluster(&self) -> usize {
        self.csize as usize * BLOCK_SIZE
    }

    /// 每簇引用数
    pub fn refs_per_cluster(&self) -> usize {
        RPB * self.csize as usize
    }

    /// 每簇目录项数
    pub fn dirents_per_cluster(&self) -> usize {
        DPB * self.csize as usize
    }

    /// 单个文件可寻址的最大簇数
    pub fn max_file_clusters(&self) -> usize {
        let rpc = self.refs_per_cluster();
        N_DIRECT + N_INDIRECT * rpc + rpc * rpc
    }

    pub fn max_file_size(&self) -> u64 {
        (self.max_file_clusters() * self.bytes_per_cluster()) as u64
    }

    /// 逻辑簇的首个物理块
    pub fn cluster_block(&self, c: ClusterId) -> u32 {
        self.czstart + u32::from(c) * self.csize
    }

    pub fn check_consistency(&self) -> Result<()> {
        let fail = |what: &str| {
            log::error!("superblock inconsistent: {what}");
            Err(Error::InvalidFormat)
        };

        if self.magic != MAGIC || self.version != VERSION {
            return fail("bad magic or version");
        }
        if self.csize == 0 || self.csize > MAX_CLUSTER_BLOCKS {
            return fail("csize");
        }
        if self.itstart != 1 || self.itsize as usize * IPB != self.itotal as usize {
            return fail("inode table geometry");
        }
        if self.czstart != self.itstart + self.itsize
            || self.czstart as u64 + self.ctotal as u64 * self.csize as u64 > self.ntotal as u64
        {
            return fail("cluster zone geometry");
        }
        if self.ifree > self.itotal {
            return fail("ifree");
        }
        if (self.ifree == 0) != (self.ihead.is_none() && self.itail.is_none()) {
            return fail("free inode list ends");
        }
        if self.cfree > self.ctotal || self.crefs > self.ctotal {
            return fail("cfree or crefs");
        }
        for cache in [&self.chead, &self.ctail] {
            if cache.in_idx >= FCT_CACHE_SIZE
                || cache.out_idx >= FCT_CACHE_SIZE
                || cache.cluster_idx >= self.refs_per_cluster()
            {
                return fail("FCT cache index");
            }
            if (self.crefs == 0) != cache.cluster.is_none() {
                return fail("FCT chain ends");
            }
            if cache.refs.iter().flatten().any(|c| u32::from(*c) >= self.ctotal) {
                return fail("FCT cache reference");
            }
        }
        // 缓存中的簇都计入 cfree
        if self.chead.len() + self.ctail.len() > self.cfree as usize {
            return fail("FCT caches hold more than cfree");
        }
        Ok(())
    }
}
