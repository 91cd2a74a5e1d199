//! # 宿主机工具
//!
//! 用镜像文件模拟块设备，供 `mksofs` 与 `sofs-packer` 使用。

mod block_file;

pub use self::block_file::BlockFile;
