//! 架构相关操作的 Mock 实现

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Mock 架构操作
///
/// 中断状态用一个全局布尔值模拟；`yield_now` 只记录调用次数，
/// 真正让出 CPU 由实现 trait 的测试代码负责（例如 `std::thread::yield_now`）。
pub struct MockArchOps {
    pub interrupt_state: AtomicBool,
    pub yields: AtomicUsize,
}

impl MockArchOps {
    pub const fn new() -> Self {
        Self {
            interrupt_state: AtomicBool::new(true),
            yields: AtomicUsize::new(0),
        }
    }

    pub unsafe fn read_and_disable_interrupts(&self) -> usize {
        self.interrupt_state.swap(false, Ordering::SeqCst) as usize
    }

    pub unsafe fn restore_interrupts(&self, flags: usize) {
        self.interrupt_state.store(flags != 0, Ordering::SeqCst);
    }

    pub fn sstatus_sie(&self) -> usize {
        0x2 // SIE bit
    }

    pub fn yield_now(&self) {
        self.yields.fetch_add(1, Ordering::Relaxed);
    }
}

/// 全局 Mock 实例
pub static MOCK_ARCH_OPS: MockArchOps = MockArchOps::new();
