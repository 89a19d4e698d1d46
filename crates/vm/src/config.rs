//! 虚拟内存布局配置 trait 定义和注册

use core::sync::atomic::{AtomicUsize, Ordering};

/// 页大小（字节）
pub const PAGE_SIZE: usize = 4096;

/// 虚拟内存布局常量
///
/// 此 trait 提供缺页处理所需的布局常量。
/// 内核需要实现此 trait 并通过 [`register_config`] 注册。
pub trait VmConfig: Send + Sync {
    /// 用户栈顶地址（栈增长的上界，不含）
    fn user_stack_top(&self) -> usize;

    /// 用户栈允许的最大大小（通常为 1 MiB）
    fn max_stack_size(&self) -> usize;

    /// 栈增长判定时允许低于栈指针的字节数
    ///
    /// x86-64 的 `push` 会在写入前检查权限，缺页地址可能比 `rsp` 低 8 字节。
    fn stack_growth_slack(&self) -> usize;

    /// 内核地址空间的起始地址；不低于它的地址都属于内核
    fn kernel_base(&self) -> usize;

    /// 判断地址是否属于内核空间
    fn is_kernel_vaddr(&self, addr: usize) -> bool {
        addr >= self.kernel_base()
    }

    /// 栈增长允许到达的最低地址
    fn stack_limit(&self) -> usize {
        self.user_stack_top() - self.max_stack_size()
    }
}

static CONFIG_DATA: AtomicUsize = AtomicUsize::new(0);
static CONFIG_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 注册配置实现
///
/// # Safety
/// 必须在单线程环境下调用，且只能调用一次
pub unsafe fn register_config(config: &'static dyn VmConfig) {
    let ptr = config as *const dyn VmConfig;
    // SAFETY: 将 fat pointer 拆分为 data 和 vtable 两部分存储
    let (data, vtable) =
        unsafe { core::mem::transmute::<*const dyn VmConfig, (usize, usize)>(ptr) };
    CONFIG_DATA.store(data, Ordering::Release);
    CONFIG_VTABLE.store(vtable, Ordering::Release);
}

/// 获取已注册的配置实现
///
/// # Panics
/// 如果尚未调用 [`register_config`] 注册实现，则 panic
#[inline]
pub fn vm_config() -> &'static dyn VmConfig {
    let data = CONFIG_DATA.load(Ordering::Acquire);
    let vtable = CONFIG_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        #[cfg(test)]
        {
            extern crate test_support;
            return &test_support::mock::mm::MOCK_VM_CONFIG;
        }
        #[cfg(not(test))]
        panic!("vm: VmConfig not registered");
    }
    // SAFETY: 重组 fat pointer
    unsafe { &*core::mem::transmute::<(usize, usize), *const dyn VmConfig>((data, vtable)) }
}
