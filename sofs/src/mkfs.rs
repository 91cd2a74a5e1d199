//! # 格式化
//!
//! 块 0 为超级块；随后是 inode 表，0 号 inode 为根目录，其余串成空闲链表；
//! 簇区中 0 号簇为根目录内容，`1..=crefs` 号簇为 FCT 链，
//! 按升序记录其余全部空闲簇。

use std::sync::Arc;

use block_dev::BlockDevice;
use vfs::Error;

use crate::layout::{DIR_ENTRY_SIZE, INODE_SIZE, refs};
use crate::{
    BLOCK_SIZE, ClusterId, DirEntry, FctCache, IPB, Inode, InodeId, InodeKind, MAGIC,
    MAX_CLUSTER_BLOCKS, MountState, RawDisk, Result, SuperBlock, VERSION, VOLUME_NAME_SIZE,
};

#[derive(Debug, Clone)]
pub struct MkfsOptions {
    /// 卷名，超过 29 字节的部分被截断
    pub name: String,
    /// 期望的 inode 数，为 0 时取总块数的八分之一
    pub inodes: u32,
    /// 每簇块数
    pub cluster_blocks: u32,
    /// 是否清零空闲簇
    pub zero: bool,
    /// 根目录的属主
    pub owner: u32,
    pub group: u32,
}

impl Default for MkfsOptions {
    fn default() -> Self {
        Self {
            name: "SOFS16".into(),
            inodes: 0,
            cluster_blocks: 2,
            zero: false,
            owner: 0,
            group: 0,
        }
    }
}

/// 计算各区域的大小，返回魔数尚未写入的超级块
fn plan(ntotal: u32, opts: &MkfsOptions) -> Result<SuperBlock> {
    let csize = opts.cluster_blocks;
    if csize == 0 || csize > MAX_CLUSTER_BLOCKS {
        return Err(Error::InvalidArgument);
    }
    let ipb = IPB as u32;

    let requested = if opts.inodes == 0 { ntotal / 8 } else { opts.inodes };
    let mut itotal = requested.max(1).div_ceil(ipb) * ipb;
    if ntotal <= 1 + itotal / ipb {
        log::error!("{ntotal} blocks cannot hold {itotal} inodes");
        return Err(Error::InvalidArgument);
    }
    // 簇区放不下的零头块并入 inode 表
    itotal += ipb * ((ntotal - 1 - itotal / ipb) % csize);
    let itsize = itotal / ipb;

    let czstart = 1 + itsize;
    let ctotal = (ntotal - czstart) / csize;
    if ctotal == 0 {
        log::error!("no room left for the root directory");
        return Err(Error::NoSpace);
    }

    let mut sb = SuperBlock {
        magic: 0xFFFF,
        version: VERSION,
        name: [0; VOLUME_NAME_SIZE],
        mstat: MountState::Clean,
        csize,
        ntotal,
        itstart: 1,
        itsize,
        itotal,
        ifree: itotal - 1,
        ihead: (itotal > 1).then_some(InodeId::new(1)),
        itail: (itotal > 1).then_some(InodeId::new(itotal - 1)),
        czstart,
        ctotal,
        cfree: 0,
        crefs: 0,
        chead: FctCache::default(),
        ctail: FctCache::default(),
    };
    sb.set_name(&opts.name);

    // 每个引用簇存 rpc - 1 个引用，最后一个槽位链向下一个引用簇
    let rpc = sb.refs_per_cluster() as u32;
    sb.crefs = (ctotal - 1).div_ceil(rpc);
    sb.cfree = ctotal - 1 - sb.crefs;
    if sb.crefs > 0 {
        sb.chead.cluster = Some(ClusterId::new(1));
        sb.ctail.cluster = Some(ClusterId::new(sb.crefs));
        sb.ctail.cluster_idx = (sb.cfree - (sb.crefs - 1) * (rpc - 1)) as usize;
    }
    Ok(sb)
}

fn write_inode_table(disk: &RawDisk, sb: &SuperBlock, root: &Inode) -> Result<()> {
    let mut buf = [0; BLOCK_SIZE];
    for block in 0..sb.itsize {
        for (i, raw) in buf.chunks_exact_mut(INODE_SIZE).enumerate() {
            let n = block * IPB as u32 + i as u32;
            let inode = if n == 0 {
                root.clone()
            } else {
                Inode::free((n + 1 < sb.itotal).then(|| InodeId::new(n + 1)))
            };
            inode.encode(raw);
        }
        disk.write_block(sb.itstart + block, &buf)?;
    }
    Ok(())
}

fn write_root_dir(disk: &RawDisk, sb: &SuperBlock) -> Result<()> {
    let mut buf = vec![0; sb.bytes_per_cluster()];
    for (i, raw) in buf.chunks_exact_mut(DIR_ENTRY_SIZE).enumerate() {
        let entry = match i {
            0 => DirEntry::new(".", InodeId::ROOT),
            1 => DirEntry::new("..", InodeId::ROOT),
            _ => DirEntry::empty(),
        };
        entry.encode(raw);
    }
    disk.write_cluster(sb.cluster_block(ClusterId::new(0)), &buf, sb.csize)
}

/// 引用簇 `1..=crefs` 依次记录空闲簇 `crefs + 1..ctotal`
fn write_fct(disk: &RawDisk, sb: &SuperBlock) -> Result<()> {
    let rpc = sb.refs_per_cluster();
    let mut next_free = sb.crefs + 1;
    let mut buf = vec![0; sb.bytes_per_cluster()];
    for i in 1..=sb.crefs {
        let mut cluster_refs = vec![None; rpc];
        for slot in &mut cluster_refs[..rpc - 1] {
            if next_free < sb.ctotal {
                *slot = Some(ClusterId::new(next_free));
                next_free += 1;
            }
        }
        cluster_refs[rpc - 1] = (i < sb.crefs).then(|| ClusterId::new(i + 1));
        refs::encode_all(&cluster_refs, &mut buf);
        disk.write_cluster(sb.cluster_block(ClusterId::new(i)), &buf, sb.csize)?;
    }
    Ok(())
}

fn write_super_block(disk: &RawDisk, sb: &SuperBlock) -> Result<()> {
    let mut buf = [0; BLOCK_SIZE];
    sb.encode(&mut buf);
    disk.write_block(0, &buf)
}

/// 格式化设备，返回写入的超级块
pub fn format(dev: Arc<dyn BlockDevice>, opts: &MkfsOptions) -> Result<SuperBlock> {
    let mut disk = RawDisk::new();
    let ntotal = disk.open(dev)?;
    let mut sb = plan(ntotal, opts)?;
    log::info!(
        "formatting {:?}: {} blocks, {} inodes, {} clusters of {} blocks",
        sb.name(),
        sb.ntotal,
        sb.itotal,
        sb.ctotal,
        sb.csize
    );

    // 格式化完成前魔数无效，中途失败的卷无法挂载
    write_super_block(&disk, &sb)?;

    let now = crate::now();
    let mut root = Inode::in_use(InodeKind::Directory, opts.owner, opts.group, now);
    root.mode |= 0o775;
    root.refcount = 2;
    root.size = 2 * DIR_ENTRY_SIZE as u32;
    root.csize = 1;
    root.d[0] = Some(ClusterId::new(0));
    write_inode_table(&disk, &sb, &root)?;
    log::info!("inode table written");

    write_root_dir(&disk, &sb)?;
    write_fct(&disk, &sb)?;
    log::info!("root directory and free cluster table written");

    if opts.zero {
        let zeros = vec![0; sb.bytes_per_cluster()];
        for c in sb.crefs + 1..sb.ctotal {
            disk.write_cluster(sb.cluster_block(ClusterId::new(c)), &zeros, sb.csize)?;
        }
        log::info!("free clusters zeroed");
    }

    sb.magic = MAGIC;
    write_super_block(&disk, &sb)?;
    disk.close()?;
    Ok(sb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry() {
        let opts = MkfsOptions::default();
        let sb = plan(1000, &opts).unwrap();
        // 125 个 inode 向上取整到 128，16 块；(1000 - 1 - 16) % 2 == 1，再补一块
        assert_eq!(sb.itotal, 136);
        assert_eq!(sb.itsize, 17);
        assert_eq!(sb.czstart, 18);
        assert_eq!(sb.ctotal, 491);
        assert_eq!(sb.czstart + sb.ctotal * sb.csize, sb.ntotal);
        // rpc = 256
        assert_eq!(sb.crefs, 2);
        assert_eq!(sb.cfree, 488);
        assert_eq!(sb.ctail.cluster_idx, 488 - 255);
        assert_eq!(sb.ifree, 135);
        assert_eq!(sb.itail, Some(InodeId::new(135)));
    }

    #[test]
    fn tiny_devices() {
        let opts = MkfsOptions {
            inodes: 8,
            cluster_blocks: 1,
            ..Default::default()
        };
        let sb = plan(3, &opts).unwrap();
        assert_eq!(sb.ctotal, 1);
        assert_eq!(sb.crefs, 0);
        assert_eq!(sb.cfree, 0);
        assert_eq!(sb.chead.cluster, None);

        assert_eq!(plan(2, &opts), Err(Error::InvalidArgument));
        // 零头块并入 inode 表后没有剩余的簇
        let wide = MkfsOptions {
            cluster_blocks: 2,
            ..opts.clone()
        };
        assert_eq!(plan(3, &wide), Err(Error::NoSpace));

        let bad = MkfsOptions {
            cluster_blocks: 9,
            ..Default::default()
        };
        assert_eq!(plan(1000, &bad), Err(Error::InvalidArgument));
    }
}
