//! # 空闲链表
//!
//! - 空闲 inode 以 `next` 串成单链表，从头部分配，向尾部归还
//! - 空闲簇表（FCT）分三层：头缓存供分配，尾缓存收归还，
//!   中间是磁盘上的引用簇链，每个引用簇最后一个槽位指向下一个引用簇

mod cluster;
mod fct;
mod inode;
