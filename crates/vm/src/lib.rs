//! 按需分页的虚拟内存核心
//!
//! 为教学内核提供帧表与二次机会时钟驱逐、补充页表、三种页面后端
//! （未初始化 / 匿名 / 文件映射）、缺页处理（含栈增长）以及 fork 时的地址空间复制。
//!
//! # 架构解耦
//!
//! 通过 trait 抽象与内核其他部分解耦：
//! - [`ArchMmOps`]: 直接映射区域的地址转换
//! - [`VmConfig`]: 虚拟内存布局常量
//! - [`PageTable`]: 每个进程的硬件页表
//! - [`BackingFile`]: 懒加载和文件映射所用的文件
//! - [`SwapDevice`]: 交换设备
//!
//! 使用前必须调用 [`register_arch_ops`] 和 [`register_config`] 注册实现，
//! 然后通过 [`vm_init`] 创建全局管理器。

#![no_std]

extern crate alloc;

mod arch_ops;
mod config;
mod error;
mod fault;
mod file;
mod fork;
mod manager;
mod space;

pub mod address;
pub mod frame_allocator;
pub mod frame_table;
pub mod page;
pub mod page_table;
pub mod spt;
pub mod swap;

#[cfg(test)]
mod tests;

pub use arch_ops::{arch_ops, register_arch_ops, ArchMmOps};
pub use config::{register_config, vm_config, VmConfig, PAGE_SIZE};
pub use error::{VmError, VmResult};
pub use fault::{vm_try_handle_fault, PageFault};
pub use file::{BackingFile, LazyLoad};
pub use fork::{supplemental_page_table_copy, ForkHandshake};
pub use manager::{kernel_vm, vm_init, Vm};
pub use space::AddressSpace;

// Re-export 常用类型
pub use address::{AlignOps, PageNum, Paddr, Ppn, UsizeConvert, Vaddr, Vpn};
pub use frame_allocator::FrameAllocator;
pub use frame_table::{FrameStats, FrameTable};
pub use page::{Page, PageKind, Pid};
pub use page_table::{PageTable, PteFlags};
pub use spt::SupplementalPageTable;
pub use swap::{SwapDevice, SwapSlot, SwapTable};

/// 注册一个页面，首次访问时按 `init` 装入内容；成功返回 `true`
pub fn vm_alloc_page_with_initializer(
    space: &mut AddressSpace,
    kind: PageKind,
    va: usize,
    writable: bool,
    init: Option<LazyLoad>,
) -> bool {
    space
        .alloc_page_with_initializer(kind, Vaddr::from_usize(va), writable, init)
        .is_ok()
}

/// 注册一个首次访问时清零的页面；成功返回 `true`
pub fn vm_alloc_page(space: &mut AddressSpace, kind: PageKind, va: usize, writable: bool) -> bool {
    space.alloc_page(kind, Vaddr::from_usize(va), writable).is_ok()
}

/// 立即装入包含 `va` 的页面；成功返回 `true`
pub fn vm_claim_page(space: &mut AddressSpace, va: usize) -> bool {
    space.claim_page(Vaddr::from_usize(va)).is_ok()
}
