//! 虚拟内存管理器
//!
//! [`Vm`] 持有全局帧表和交换槽表，内核启动时通过 [`vm_init`] 创建一次，
//! 之后每个 [`AddressSpace`](crate::AddressSpace) 共享同一个实例。

use alloc::sync::Arc;

use lazy_static::lazy_static;
use sync::SpinLock;

use crate::frame_allocator::FrameAllocator;
use crate::frame_table::FrameTable;
use crate::swap::{SwapDevice, SwapTable};

/// 虚拟内存管理器
pub struct Vm {
    frames: FrameTable,
    swap: SwapTable,
}

impl Vm {
    /// 由帧分配器和交换槽表创建管理器
    pub fn new(allocator: FrameAllocator, swap: SwapTable) -> Self {
        Self {
            frames: FrameTable::new(allocator),
            swap,
        }
    }

    /// 帧表
    pub fn frames(&self) -> &FrameTable {
        &self.frames
    }

    /// 交换槽表
    pub fn swap(&self) -> &SwapTable {
        &self.swap
    }
}

lazy_static! {
    /// 内核唯一的虚拟内存管理器
    static ref KERNEL_VM: SpinLock<Option<Arc<Vm>>> = SpinLock::new(None);
}

/// 初始化内核虚拟内存管理器
///
/// `[pool_start, pool_end)` 是用户帧池的物理地址范围；没有交换设备时
/// 匿名页无法被驱逐。重复调用会替换之前的实例。
pub fn vm_init(pool_start: usize, pool_end: usize, swap: Option<Arc<dyn SwapDevice>>) -> Arc<Vm> {
    let allocator = FrameAllocator::from_addr_range(pool_start, pool_end);
    let swap = match swap {
        Some(device) => SwapTable::new(device),
        None => SwapTable::empty(),
    };
    log::info!(
        "vm: {} user frames, {} swap slots",
        allocator.total_frames(),
        swap.capacity()
    );
    let vm = Arc::new(Vm::new(allocator, swap));
    *KERNEL_VM.lock() = Some(vm.clone());
    vm
}

/// 获取内核虚拟内存管理器；[`vm_init`] 之前返回 `None`
pub fn kernel_vm() -> Option<Arc<Vm>> {
    KERNEL_VM.lock().clone()
}
