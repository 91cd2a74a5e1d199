mod common;

use sofs::{AccessFlag, Credentials, InodeId, InodeKind};
use vfs::Error;

use common::mounted;

#[test]
fn handles_share_one_copy() {
    let mut vol = mounted(500, 1);
    let n = vol.alloc_inode(InodeKind::Regular).unwrap();

    let a = vol.iopen(n).unwrap();
    let b = vol.iopen(n).unwrap();
    assert_eq!(a, b);
    vol.iget_mut(a).unwrap().size = 42;
    vol.iclose(a).unwrap();
    assert_eq!(vol.iget(b).unwrap().size, 42);
    vol.iclose(b).unwrap();
    assert_eq!(vol.iget(b), Err(Error::BadDescriptor));

    // 关闭时已写回
    let size = vol.with_inode(n, |vol, ih| Ok(vol.iget(ih)?.size)).unwrap();
    assert_eq!(size, 42);
    assert_eq!(
        vol.iopen(InodeId::new(vol.super_block().unwrap().itotal)),
        Err(Error::InvalidArgument)
    );
}

#[test]
fn refcount_bounds() {
    let mut vol = mounted(500, 1);
    let n = vol.alloc_inode(InodeKind::Regular).unwrap();
    vol.with_inode(n, |vol, ih| {
        assert_eq!(vol.dec_refcount(ih), Err(Error::InvalidArgument));
        assert_eq!(vol.inc_refcount(ih), Ok(1));
        assert_eq!(vol.inc_refcount(ih), Ok(2));
        assert_eq!(vol.dec_refcount(ih), Ok(1));
        assert_eq!(vol.iget(ih)?.refcount, 1);

        vol.iget_mut(ih)?.refcount = u16::MAX;
        assert_eq!(vol.inc_refcount(ih), Err(Error::TooManyLinks));
        Ok(())
    })
    .unwrap();
}

#[test]
fn permission_triplets() {
    let mut vol = mounted(500, 1);
    vol.set_credentials(Credentials { uid: 10, gid: 20 });
    let n = vol.alloc_inode(InodeKind::Regular).unwrap();

    vol.with_inode(n, |vol, ih| {
        vol.set_access(ih, 0o6_421)?;
        assert_eq!(vol.get_access(ih)?, 0o6_421);
        vol.set_access(ih, 0o421)?;
        assert_eq!(vol.iget(ih)?.kind(), Some(InodeKind::Regular));

        let rw = AccessFlag::Read | AccessFlag::Write;
        // 属主 r--
        assert!(vol.check_access(ih, AccessFlag::Read.into())?);
        assert!(!vol.check_access(ih, rw)?);

        // 属组 -w-
        vol.set_credentials(Credentials { uid: 11, gid: 20 });
        assert!(vol.check_access(ih, AccessFlag::Write.into())?);
        assert!(!vol.check_access(ih, AccessFlag::Read.into())?);

        // 其他人 --x
        vol.set_credentials(Credentials { uid: 12, gid: 21 });
        assert!(vol.check_access(ih, AccessFlag::Exec.into())?);
        assert!(!vol.check_access(ih, AccessFlag::Write.into())?);

        vol.set_credentials(Credentials::ROOT);
        assert!(vol.check_access(ih, rw | AccessFlag::Exec)?);
        vol.set_access(ih, 0o600)?;
        assert!(vol.check_access(ih, rw)?);
        assert!(!vol.check_access(ih, AccessFlag::Exec.into())?);
        Ok(())
    })
    .unwrap();
}

#[test]
fn consistency_counts_reachable_clusters() {
    let mut vol = mounted(500, 1);
    let n = vol.alloc_inode(InodeKind::Regular).unwrap();
    vol.with_inode(n, |vol, ih| {
        vol.alloc_file_cluster(ih, 0)?;
        vol.alloc_file_cluster(ih, 7)?;
        vol.check_inode_consistency(ih)?;

        vol.iget_mut(ih)?.csize += 1;
        assert_eq!(vol.check_inode_consistency(ih), Err(Error::InvalidFormat));
        vol.iget_mut(ih)?.csize -= 1;
        Ok(())
    })
    .unwrap();
    vol.with_inode(InodeId::ROOT, |vol, ih| vol.check_inode_consistency(ih))
        .unwrap();
}
