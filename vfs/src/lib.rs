//! 文件系统与其使用者之间交换的类型：错误码、文件属性与目录项。

#![no_std]

extern crate alloc;

mod dirent;
mod error;
mod stat;

pub use self::{
    dirent::{DirEntry, DirEntryType},
    error::Error,
    stat::Stat,
};
