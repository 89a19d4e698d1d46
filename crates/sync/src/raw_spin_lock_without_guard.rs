//! 不关中断的自旋锁
//!
//! 基于 [`lock_api`] 实现，适用于不会在中断上下文中访问的数据
//! （例如页描述符状态、交换槽位图）。与 [`crate::SpinLock`] 不同，
//! 持锁期间不会禁用本地中断，因此持锁时间可以稍长（例如等待磁盘 I/O）。

use core::{
    hint,
    sync::atomic::{AtomicBool, Ordering},
};

/// 不关中断的原始自旋锁，实现 [`lock_api::RawMutex`]。
#[derive(Debug)]
pub struct RawSpinLockWithoutGuard {
    lock: AtomicBool,
}

unsafe impl lock_api::RawMutex for RawSpinLockWithoutGuard {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawSpinLockWithoutGuard {
        lock: AtomicBool::new(false),
    };

    type GuardMarker = lock_api::GuardSend;

    fn lock(&self) {
        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // 先只读等待，减少缓存行争用
            while self.lock.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
        }
    }

    fn try_lock(&self) -> bool {
        self.lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock(&self) {
        self.lock.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.lock.load(Ordering::Relaxed)
    }
}

/// 不关中断的自旋互斥锁
///
/// # 示例
/// ```ignore
/// let m = SpinMutex::new(0);
/// *m.lock() += 1;
/// ```
pub type SpinMutex<T> = lock_api::Mutex<RawSpinLockWithoutGuard, T>;

/// [`SpinMutex`] 的 RAII 保护器
pub type SpinMutexGuard<'a, T> = lock_api::MutexGuard<'a, RawSpinLockWithoutGuard, T>;
