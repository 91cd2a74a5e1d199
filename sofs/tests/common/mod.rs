#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use block_dev::{BlockDevice, RamDisk};
use sofs::{BLOCK_SIZE, ClusterId, Credentials, InodeId, MkfsOptions, Volume, format};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn ram_disk(blocks: usize) -> Arc<dyn BlockDevice> {
    Arc::new(RamDisk::new(BLOCK_SIZE, blocks))
}

/// 格式化并以 root 身份挂载
pub fn mounted(blocks: usize, cluster_blocks: u32) -> Volume {
    init_logger();
    let dev = ram_disk(blocks);
    let opts = MkfsOptions {
        cluster_blocks,
        ..Default::default()
    };
    format(dev.clone(), &opts).unwrap();
    Volume::mount(dev, Credentials::ROOT).unwrap()
}

/// 在用 inode 占用的簇数之和
pub fn assigned_clusters(vol: &mut Volume) -> u32 {
    let itotal = vol.super_block().unwrap().itotal;
    (0..itotal)
        .map(|n| {
            vol.with_inode(InodeId::new(n), |vol, ih| {
                let inode = vol.iget(ih)?;
                Ok(if inode.is_free() { 0 } else { inode.csize })
            })
            .unwrap()
        })
        .sum()
}

/// 空闲簇、已分配簇与 FCT 引用簇加起来恰好是整个簇区
pub fn check_conservation(vol: &mut Volume, held: u32) {
    let assigned = assigned_clusters(vol);
    let sb = vol.super_block().unwrap();
    assert_eq!(sb.cfree + assigned + held + sb.crefs, sb.ctotal);
    sb.check_consistency().unwrap();
}

/// 把所有空闲簇分配出来，检查没有重复
pub fn drain_clusters(vol: &mut Volume) -> HashSet<ClusterId> {
    let mut taken = HashSet::new();
    while vol.super_block().unwrap().cfree > 0 {
        let c = vol.alloc_cluster().unwrap();
        assert!(taken.insert(c), "cluster {c} allocated twice");
    }
    taken
}
