mod common;

use std::collections::HashSet;

use sofs::{InodeId, InodeKind, InodeState};
use vfs::Error;

use common::{check_conservation, drain_clusters, mounted};

/// 沿空闲链表收集 inode 号
fn free_chain(vol: &mut sofs::Volume) -> Vec<InodeId> {
    let mut chain = Vec::new();
    let mut cur = vol.super_block().unwrap().ihead;
    while let Some(n) = cur {
        cur = vol
            .with_inode(n, |vol, ih| match vol.iget(ih)?.state {
                InodeState::Free { next } => Ok(next),
                InodeState::InUse { .. } => panic!("inode {n} in use on the free list"),
            })
            .unwrap();
        chain.push(n);
    }
    chain
}

#[test]
fn inode_alloc_free_inverse() {
    let mut vol = mounted(1000, 2);
    let before: HashSet<_> = free_chain(&mut vol).into_iter().collect();
    let ifree = vol.super_block().unwrap().ifree;
    assert_eq!(before.len(), ifree as usize);
    assert_eq!(vol.super_block().unwrap().ihead, Some(InodeId::new(1)));

    let taken: Vec<_> = (0..10)
        .map(|_| vol.alloc_inode(InodeKind::Regular).unwrap())
        .collect();
    assert_eq!(taken[0], InodeId::new(1));
    assert_eq!(vol.super_block().unwrap().ifree, ifree - 10);
    vol.with_inode(taken[3], |vol, ih| {
        let inode = vol.iget(ih)?;
        assert!(!inode.is_free());
        assert_eq!(inode.kind(), Some(InodeKind::Regular));
        assert_eq!(inode.csize, 0);
        assert_eq!(inode.d, [None; sofs::N_DIRECT]);
        Ok(())
    })
    .unwrap();

    for &n in taken.iter().rev().step_by(2).chain(taken.iter().step_by(2)) {
        vol.free_inode(n).unwrap();
    }
    // 重复释放无效果
    vol.free_inode(taken[0]).unwrap();

    let after: HashSet<_> = free_chain(&mut vol).into_iter().collect();
    assert_eq!(after, before);
    assert_eq!(vol.super_block().unwrap().ifree, ifree);
    assert_eq!(vol.free_inode(InodeId::ROOT), Err(Error::InvalidArgument));
}

#[test]
fn inodes_run_out() {
    let mut vol = mounted(200, 1);
    let ifree = vol.super_block().unwrap().ifree;
    for _ in 0..ifree {
        vol.alloc_inode(InodeKind::Directory).unwrap();
    }
    let sb = vol.super_block().unwrap();
    assert_eq!((sb.ihead, sb.itail), (None, None));
    assert_eq!(vol.alloc_inode(InodeKind::Regular), Err(Error::NoSpace));

    vol.free_inode(InodeId::new(5)).unwrap();
    let sb = vol.super_block().unwrap();
    assert_eq!((sb.ihead, sb.itail), (Some(InodeId::new(5)), Some(InodeId::new(5))));
    assert_eq!(vol.alloc_inode(InodeKind::Regular), Ok(InodeId::new(5)));
}

#[test]
fn clusters_are_conserved() {
    let mut vol = mounted(1000, 1);
    check_conservation(&mut vol, 0);
    let ctotal = vol.super_block().unwrap().ctotal;

    let mut held = Vec::new();
    for _ in 0..120 {
        held.push(vol.alloc_cluster().unwrap());
    }
    check_conservation(&mut vol, held.len() as u32);

    for c in held.drain(..).rev() {
        vol.free_cluster(c).unwrap();
    }
    check_conservation(&mut vol, 0);

    assert_eq!(
        vol.free_cluster(sofs::ClusterId::new(ctotal)),
        Err(Error::InvalidArgument)
    );
}

#[test]
fn replenish_and_deplete_never_lose_clusters() {
    let mut vol = mounted(1200, 1);
    let cfree = vol.super_block().unwrap().cfree;

    // 第一轮：取尽所有空闲簇，FCT 链随之清空
    let first = drain_clusters(&mut vol);
    assert!(first.len() as u32 > cfree, "reference clusters are handed out too");
    let sb = vol.super_block().unwrap();
    assert_eq!((sb.cfree, sb.crefs), (0, 0));
    assert_eq!(vol.alloc_cluster(), Err(Error::NoSpace));
    check_conservation(&mut vol, first.len() as u32);

    // 全部归还，尾缓存多次写满，重建 FCT 链
    for &c in &first {
        vol.free_cluster(c).unwrap();
    }
    assert!(vol.super_block().unwrap().crefs > 0);
    check_conservation(&mut vol, 0);

    // 第二轮：链簇本身也是空闲簇
    let second = drain_clusters(&mut vol);
    assert_eq!(first, second);
    check_conservation(&mut vol, second.len() as u32);
}

#[test]
fn interleaved_alloc_free() {
    let mut vol = mounted(600, 1);
    let mut held = Vec::new();
    for round in 0..20 {
        for _ in 0..37 {
            held.push(vol.alloc_cluster().unwrap());
        }
        for _ in 0..(17 + round) {
            let c = held.swap_remove(round % held.len());
            vol.free_cluster(c).unwrap();
        }
        let unique: HashSet<_> = held.iter().collect();
        assert_eq!(unique.len(), held.len());
        check_conservation(&mut vol, held.len() as u32);
    }
}
