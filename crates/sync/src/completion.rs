//! 一次性完成量
//!
//! 用于两个内核线程之间的“结果交接”：一方调用 [`Completion::complete`]
//! 交付结果，另一方在 [`Completion::wait`] 中阻塞直到结果到达。
//!
//! 典型用法是 fork 握手：父进程在子进程复制完地址空间之前不能继续运行，
//! 子进程复制完成（或失败）后通过完成量通知父进程。
//!
//! 等待方在两次检查之间通过 [`crate::ArchOps::yield_now`] 让出 CPU，
//! 由调度器决定何时再次运行它，而不是原地自旋。

use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch_ops;
use crate::raw_spin_lock_without_guard::SpinMutex;

/// 一次性完成量，携带类型为 `T` 的结果。
pub struct Completion<T> {
    done: AtomicBool,
    value: SpinMutex<Option<T>>,
}

impl<T> Completion<T> {
    /// 创建一个尚未完成的完成量。
    pub const fn new() -> Self {
        Completion {
            done: AtomicBool::new(false),
            value: SpinMutex::new(None),
        }
    }

    /// 交付结果并唤醒等待方。
    ///
    /// 完成量只能交付一次；重复交付的结果会被丢弃。
    pub fn complete(&self, value: T) {
        let mut slot = self.value.lock();
        if self.done.load(Ordering::Acquire) {
            debug_assert!(false, "Completion::complete called twice");
            return;
        }
        *slot = Some(value);
        self.done.store(true, Ordering::Release);
    }

    /// 检查结果是否已经交付。
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// 若结果已交付则取走它，否则返回 `None`（不阻塞）。
    pub fn try_take(&self) -> Option<T> {
        if !self.is_done() {
            return None;
        }
        self.value.lock().take()
    }

    /// 阻塞直到结果交付，并取走结果。
    ///
    /// # Panics
    /// 如果结果已经被另一个等待方取走，则 panic。
    pub fn wait(&self) -> T {
        while !self.is_done() {
            arch_ops().yield_now();
        }
        self.value
            .lock()
            .take()
            .expect("Completion: result already taken")
    }
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}
