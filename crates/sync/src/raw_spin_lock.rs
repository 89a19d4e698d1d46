//! 关中断的自旋锁
//!
//! [`RawSpinLock`] 实现 [`lock_api::RawMutex`]：加锁时先禁用本地中断，
//! 再自旋获取锁标志；解锁时先释放锁标志，再恢复加锁前的中断状态。
//! [`SpinLock`] 是在其上构造的带数据互斥锁。
//!
//! 锁不可重入。持锁期间中断处于关闭状态，应避免长时间运行的操作。

use core::{
    hint,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use crate::intr_guard::IntrGuard;

/// 关中断的原始自旋锁。
#[derive(Debug)]
pub struct RawSpinLock {
    lock: AtomicBool,
    /// 持锁者加锁前的中断状态，仅由持锁者读写
    saved_flags: AtomicUsize,
}

impl RawSpinLock {
    fn acquire_flag(&self) {
        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            hint::spin_loop();
        }
    }
}

unsafe impl lock_api::RawMutex for RawSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawSpinLock {
        lock: AtomicBool::new(false),
        saved_flags: AtomicUsize::new(0),
    };

    type GuardMarker = lock_api::GuardNoSend;

    fn lock(&self) {
        let guard = IntrGuard::new();
        self.acquire_flag();
        self.saved_flags
            .store(guard.into_flags(), Ordering::Relaxed);
    }

    fn try_lock(&self) -> bool {
        let guard = IntrGuard::new();
        if self
            .lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            self.saved_flags
                .store(guard.into_flags(), Ordering::Relaxed);
            true
        } else {
            // guard 在这里被 drop，立即恢复中断状态
            false
        }
    }

    unsafe fn unlock(&self) {
        let guard = IntrGuard::from_flags(self.saved_flags.load(Ordering::Relaxed));
        self.lock.store(false, Ordering::Release);
        drop(guard);
    }

    fn is_locked(&self) -> bool {
        self.lock.load(Ordering::Relaxed)
    }
}

/// 提供对数据的互斥访问的自旋锁（持锁期间关闭本地中断）。
///
/// # 示例
/// ```ignore
/// let lock = SpinLock::new(0);
/// {
///     let mut guard = lock.lock(); // 获取锁，禁用中断
///     *guard += 1;
/// } // 离开作用域，释放锁并恢复中断状态
/// ```
pub type SpinLock<T> = lock_api::Mutex<RawSpinLock, T>;

/// [`SpinLock`] 的 RAII 保护器
pub type SpinLockGuard<'a, T> = lock_api::MutexGuard<'a, RawSpinLock, T>;
