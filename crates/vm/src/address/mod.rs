//! 地址与页号
//!
//! [`Vaddr`] / [`Paddr`] 包装原始地址，[`Vpn`] / [`Ppn`] 是对应的页号。
//! 补充页表以 [`Vpn`] 为键，帧表以 [`Ppn`] 作为帧的句柄；
//! [`AlignOps`] 提供按 [`PAGE_SIZE`](crate::PAGE_SIZE) 对齐的辅助方法。
pub mod operations;
pub mod page_num;
pub mod types;

pub use operations::{AlignOps, UsizeConvert};
pub use page_num::{PageNum, Ppn, Vpn};
pub use types::{Paddr, Vaddr};
