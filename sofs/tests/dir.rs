mod common;

use sofs::{Credentials, DirEntry, InodeId, InodeKind, MAX_NAME};
use vfs::Error;

use common::{check_conservation, mounted};

#[test]
fn entry_lifecycle() {
    let mut vol = mounted(1000, 1);
    let child = vol.alloc_inode(InodeKind::Regular).unwrap();

    vol.with_inode(InodeId::ROOT, |vol, ih| {
        let before = vol.iget(ih)?.size;
        vol.add_dir_entry(ih, "x", child)?;
        assert_eq!(vol.get_dir_entry(ih, "x")?, Some(child));
        assert_eq!(vol.add_dir_entry(ih, "x", child), Err(Error::AlreadyExists));

        assert_eq!(vol.delete_dir_entry(ih, "x")?, child);
        assert_eq!(vol.get_dir_entry(ih, "x")?, None);
        assert_eq!(vol.iget(ih)?.size, before);
        assert_eq!(vol.delete_dir_entry(ih, "x"), Err(Error::NotFound));
        Ok(())
    })
    .unwrap();
}

#[test]
fn names_are_checked() {
    let mut vol = mounted(1000, 1);
    let long = "n".repeat(MAX_NAME + 1);
    vol.with_inode(InodeId::ROOT, |vol, ih| {
        assert_eq!(vol.add_dir_entry(ih, "", InodeId::new(1)), Err(Error::InvalidArgument));
        assert_eq!(vol.add_dir_entry(ih, "a/b", InodeId::new(1)), Err(Error::InvalidArgument));
        assert_eq!(vol.add_dir_entry(ih, &long, InodeId::new(1)), Err(Error::NameTooLong));
        assert_eq!(vol.get_dir_entry(ih, &long), Err(Error::NameTooLong));
        vol.add_dir_entry(ih, &long[1..], InodeId::new(1))?;
        assert_eq!(vol.get_dir_entry(ih, &long[1..])?, Some(InodeId::new(1)));
        Ok(())
    })
    .unwrap();
}

#[test]
fn entries_span_clusters_and_compact() {
    let mut vol = mounted(1000, 1);
    let dpc = vol.super_block().unwrap().dirents_per_cluster();
    let count = 3 * dpc;

    vol.with_inode(InodeId::ROOT, |vol, ih| {
        for i in 0..count {
            vol.add_dir_entry(ih, &format!("f{i}"), InodeId::new(i as u32 + 1))?;
        }
        let total = count + 2;
        assert_eq!(vol.iget(ih)?.size as usize, total * 64);
        assert_eq!(vol.iget(ih)?.csize as usize, total.div_ceil(dpc));

        // 删除首簇中的项，由最后一项填补
        let last = format!("f{}", count - 1);
        vol.delete_dir_entry(ih, "f0")?;
        assert_eq!(vol.get_dir_entry(ih, &last)?, Some(InodeId::new(count as u32)));
        let mut buf = vec![0; dpc * 64];
        vol.read_file_cluster(ih, 0, &mut buf)?;
        assert_eq!(DirEntry::decode(&buf[128..192]).name, last);

        // 删到最后一簇为空时，该簇被释放
        let remove = (total - 1) % dpc;
        for i in 1..=remove {
            vol.delete_dir_entry(ih, &format!("f{i}"))?;
        }
        let left = total - 1 - remove;
        assert_eq!(left % dpc, 0);
        assert_eq!(vol.iget(ih)?.csize as usize, left / dpc);
        assert_eq!(vol.get_file_cluster(ih, left / dpc)?, None);
        vol.check_inode_consistency(ih)
    })
    .unwrap();
    check_conservation(&mut vol, 0);
}

#[test]
fn rename_in_place() {
    let mut vol = mounted(1000, 1);
    vol.with_inode(InodeId::ROOT, |vol, ih| {
        vol.add_dir_entry(ih, "a", InodeId::new(1))?;
        vol.add_dir_entry(ih, "b", InodeId::new(2))?;
        assert_eq!(vol.rename_dir_entry(ih, "a", "b"), Err(Error::AlreadyExists));
        assert_eq!(vol.rename_dir_entry(ih, "zz", "c"), Err(Error::NotFound));
        vol.rename_dir_entry(ih, "a", "a")?;
        vol.rename_dir_entry(ih, "a", "c")?;
        assert_eq!(vol.get_dir_entry(ih, "a")?, None);
        assert_eq!(vol.get_dir_entry(ih, "c")?, Some(InodeId::new(1)));
        Ok(())
    })
    .unwrap();
}

#[test]
fn traverse_scenario() {
    let mut vol = mounted(1000, 2);
    assert_eq!(vol.traverse_path("/"), Ok(InodeId::ROOT));
    let a = vol.mkdir("/a", 0o755).unwrap();
    assert_eq!(vol.traverse_path("/a"), Ok(a));
    assert_eq!(vol.traverse_path("/a/"), Ok(a));
    assert_eq!(vol.traverse_path("/a/."), Ok(a));
    assert_eq!(vol.traverse_path("/a/.."), Ok(InodeId::ROOT));
    assert_eq!(vol.traverse_path("/a/b"), Err(Error::NotFound));
    assert_eq!(vol.traverse_path("a"), Err(Error::InvalidArgument));

    vol.mknod("/a/f", 0o644).unwrap();
    assert_eq!(vol.traverse_path("/a/f/g"), Err(Error::NotADirectory));
    let long = format!("/{}", "n".repeat(MAX_NAME + 1));
    assert_eq!(vol.traverse_path(&long), Err(Error::NameTooLong));
    let deep = "/a".repeat(3000);
    assert_eq!(vol.traverse_path(&deep), Err(Error::NameTooLong));
}

#[test]
fn traverse_needs_exec() {
    let mut vol = mounted(1000, 1);
    vol.mkdir("/locked", 0o700).unwrap();
    vol.mknod("/locked/f", 0o644).unwrap();

    vol.set_credentials(Credentials { uid: 1000, gid: 1000 });
    assert_eq!(vol.traverse_path("/locked/f"), Err(Error::PermissionDenied));
    assert!(vol.traverse_path("/locked").is_ok());

    vol.set_credentials(Credentials::ROOT);
    assert!(vol.traverse_path("/locked/f").is_ok());
}
