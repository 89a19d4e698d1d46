//! 架构相关内存管理操作 trait 定义和注册

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::address::{PageNum, Ppn, UsizeConvert};
use crate::config::PAGE_SIZE;

/// 架构相关内存管理操作
///
/// 此 trait 抽象了内核直接映射区域的地址转换。
/// 内核需要为具体架构实现此 trait。
pub trait ArchMmOps: Send + Sync {
    /// 将虚拟地址转换为物理地址（直接映射区域）
    ///
    /// # Safety
    /// 调用者必须确保虚拟地址已经映射
    unsafe fn vaddr_to_paddr(&self, vaddr: usize) -> usize;

    /// 将物理地址转换为虚拟地址（直接映射区域）
    fn paddr_to_vaddr(&self, paddr: usize) -> usize;
}

static ARCH_OPS_DATA: AtomicUsize = AtomicUsize::new(0);
static ARCH_OPS_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 注册架构操作实现
///
/// # Safety
/// 必须在单线程环境下调用，且只能调用一次
pub unsafe fn register_arch_ops(ops: &'static dyn ArchMmOps) {
    let ptr = ops as *const dyn ArchMmOps;
    // SAFETY: 将 fat pointer 拆分为 data 和 vtable 两部分存储
    let (data, vtable) =
        unsafe { core::mem::transmute::<*const dyn ArchMmOps, (usize, usize)>(ptr) };
    ARCH_OPS_DATA.store(data, Ordering::Release);
    ARCH_OPS_VTABLE.store(vtable, Ordering::Release);
}

/// 获取已注册的架构操作实现
///
/// # Panics
/// 如果尚未调用 [`register_arch_ops`] 注册实现，则 panic
#[inline]
pub fn arch_ops() -> &'static dyn ArchMmOps {
    let data = ARCH_OPS_DATA.load(Ordering::Acquire);
    let vtable = ARCH_OPS_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        #[cfg(test)]
        {
            extern crate test_support;
            return &test_support::mock::mm::MOCK_MM_OPS;
        }
        #[cfg(not(test))]
        panic!("vm: ArchMmOps not registered");
    }
    // SAFETY: 重组 fat pointer
    unsafe { &*core::mem::transmute::<(usize, usize), *const dyn ArchMmOps>((data, vtable)) }
}

/// 通过直接映射访问一个物理帧的全部字节。
///
/// # Safety
/// `ppn` 必须是当前由调用者独占使用的已分配帧（通常意味着持有帧表锁，
/// 或帧处于 pinned 状态，或持有占用该帧的页的状态锁）。
pub(crate) unsafe fn frame_bytes<'a>(ppn: Ppn) -> &'a mut [u8] {
    let kva = arch_ops().paddr_to_vaddr(ppn.start_addr().as_usize());
    unsafe { core::slice::from_raw_parts_mut(kva as *mut u8, PAGE_SIZE) }
}

/// 将帧内容清零
pub(crate) fn clear_frame(ppn: Ppn) {
    // SAFETY: 调用者刚刚从分配器或驱逐路径拿到该帧，没有其他使用者
    unsafe { frame_bytes(ppn).fill(0) };
}
