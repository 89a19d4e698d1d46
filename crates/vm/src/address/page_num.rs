//! 页号抽象模块
//!
//! 此模块定义了表示页号 (Page Number) 的 Trait 和具体的页号类型 (Ppn, Vpn)。
//! 页号是地址空间中页 (Page) 的索引，它将内存管理抽象与底层硬件地址解耦。

use core::fmt;

use crate::address::operations::{AlignOps, UsizeConvert};
use crate::address::types::{Paddr, Vaddr};
use crate::config::PAGE_SIZE;
use crate::impl_usize_convert;

/// [PageNum] Trait
/// ---------------------
/// 表示一个页号的 Trait。所有页号类型 (如 Ppn 和 Vpn) 必须实现此 Trait。
pub trait PageNum: UsizeConvert + PartialEq + Eq + PartialOrd + Ord {
    /// 此页号类型关联的地址类型（例如 Ppn 关联 Paddr，Vpn 关联 Vaddr）。
    type TAddress: AlignOps;

    /// 将地址转换为页号 (向下取整，即包含该地址的页)。
    fn from_addr_floor(addr: Self::TAddress) -> Self {
        Self::from_usize(addr.align_down_to_page().as_usize() / PAGE_SIZE)
    }

    /// 将地址转换为页号 (向上取整)。
    fn from_addr_ceil(addr: Self::TAddress) -> Self {
        Self::from_usize(addr.align_up_to_page().as_usize() / PAGE_SIZE)
    }

    /// 获取该页号对应的起始地址。
    fn start_addr(self) -> Self::TAddress {
        Self::TAddress::from_usize(self.as_usize() * PAGE_SIZE)
    }

    /// 下一个页号
    fn next(self) -> Self {
        Self::from_usize(self.as_usize() + 1)
    }

    /// 上一个页号
    fn prev(self) -> Self {
        Self::from_usize(self.as_usize() - 1)
    }
}

/// [Ppn] (Physical Page Number)
/// ---------------------
/// 物理页号，对应物理地址 (Paddr)。同时用作物理帧在帧表中的稳定句柄。
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ppn(pub usize);
impl_usize_convert!(Ppn);
impl PageNum for Ppn {
    type TAddress = Paddr;
}

/// [Vpn] (Virtual Page Number)
/// ---------------------
/// 虚拟页号，对应虚拟地址 (Vaddr)。补充页表以它为键。
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Vpn(pub usize);
impl_usize_convert!(Vpn);
impl PageNum for Vpn {
    type TAddress = Vaddr;
}

impl fmt::Debug for Ppn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ppn({:#x})", self.0)
    }
}

impl fmt::Debug for Vpn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vpn({:#x})", self.0)
    }
}
