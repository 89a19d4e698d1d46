//! 内存管理相关操作的 Mock 实现
//!
//! 注意：这里不直接依赖 `vm` crate（避免循环依赖）。
//! `vm` crate 在 `cfg(test)` 下为这些类型实现其 trait（例如 `ArchMmOps` / `VmConfig`）。

/// Mock 的内存管理架构操作
///
/// 默认实现采用“恒等映射”（vaddr == paddr）：测试用堆上分配的缓冲区充当物理内存，
/// 其地址同时作为物理地址和内核虚拟地址使用。
pub struct MockMmOps;

impl MockMmOps {
    pub const fn new() -> Self {
        Self
    }

    /// 将虚拟地址转换为物理地址（测试默认：恒等映射）
    ///
    /// # Safety
    /// 仅用于测试环境的可控输入。
    pub unsafe fn vaddr_to_paddr(&self, vaddr: usize) -> usize {
        vaddr
    }

    /// 将物理地址转换为虚拟地址（测试默认：恒等映射）
    pub fn paddr_to_vaddr(&self, paddr: usize) -> usize {
        paddr
    }
}

/// 全局 Mock 实例
pub static MOCK_MM_OPS: MockMmOps = MockMmOps::new();

/// Mock 的虚拟内存布局配置
///
/// 布局仿照 x86-64 教学内核：用户栈顶位于 `0x4748_0000`，内核空间从
/// `0x80_0400_0000` 开始，栈最大 1 MiB，栈增长允许 8 字节的余量。
pub struct MockVmConfig;

impl MockVmConfig {
    pub const fn new() -> Self {
        Self
    }

    pub fn user_stack_top(&self) -> usize {
        0x4748_0000
    }

    pub fn max_stack_size(&self) -> usize {
        1024 * 1024
    }

    pub fn stack_growth_slack(&self) -> usize {
        8
    }

    pub fn kernel_base(&self) -> usize {
        0x80_0400_0000
    }
}

/// 全局 Mock 实例
pub static MOCK_VM_CONFIG: MockVmConfig = MockVmConfig::new();
