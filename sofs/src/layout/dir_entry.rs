use vfs::Error;

use super::{Reader, Writer};
use crate::reference::{decode, encode};
use crate::{InodeId, MAX_NAME, Result};

pub const DIR_ENTRY_SIZE: usize = 64;

const NAME_SIZE: usize = MAX_NAME + 1;

/// 目录项，目录文件的内容即目录项数组
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub inode: Option<InodeId>,
}

impl DirEntry {
    pub fn new(name: &str, inode: InodeId) -> Self {
        Self {
            name: name.into(),
            inode: Some(inode),
        }
    }

    /// 未使用的目录项
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            inode: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inode.is_none()
    }

    /// 名字不能为空、不能含 `/`，且不超过 [`MAX_NAME`] 字节
    pub fn check_name(name: &str) -> Result<()> {
        if name.is_empty() || name.contains('/') || name.contains('\0') {
            return Err(Error::InvalidArgument);
        }
        if name.len() > MAX_NAME {
            return Err(Error::NameTooLong);
        }
        Ok(())
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut r = Reader::new(buf);
        let raw: [u8; NAME_SIZE] = r.bytes();
        let len = raw.iter().position(|&b| b == 0).unwrap_or(MAX_NAME);
        Self {
            name: String::from_utf8_lossy(&raw[..len]).into_owned(),
            inode: decode(r.u32()),
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        let mut raw = [0; NAME_SIZE];
        let len = self.name.len().min(MAX_NAME);
        raw[..len].copy_from_slice(&self.name.as_bytes()[..len]);

        let mut w = Writer::new(buf);
        w.bytes(&raw);
        w.u32(encode(self.inode));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(DirEntry::check_name("hello.txt"), Ok(()));
        assert_eq!(DirEntry::check_name(""), Err(Error::InvalidArgument));
        assert_eq!(DirEntry::check_name("a/b"), Err(Error::InvalidArgument));
        assert_eq!(DirEntry::check_name(&"x".repeat(MAX_NAME)), Ok(()));
        assert_eq!(
            DirEntry::check_name(&"x".repeat(MAX_NAME + 1)),
            Err(Error::NameTooLong)
        );
    }

    #[test]
    fn empty_slot() {
        let mut buf = [0xAA; DIR_ENTRY_SIZE];
        DirEntry::empty().encode(&mut buf);
        assert!(buf[..NAME_SIZE].iter().all(|&b| b == 0));
        assert!(DirEntry::decode(&buf).is_empty());

        DirEntry::new("..", InodeId::ROOT).encode(&mut buf);
        assert_eq!(&buf[60..], &[0; 4]);
        assert_eq!(DirEntry::decode(&buf).name, "..");
    }
}
