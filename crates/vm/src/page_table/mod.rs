//! 硬件页表接口
//!
//! 虚拟内存核心不直接操作页表项，而是通过 [`PageTable`] 与每个进程的
//! 硬件页表交互。内核为具体架构实现此 trait。

use crate::address::{Ppn, Vpn};
use crate::error::VmResult;

bitflags::bitflags! {
    /// 与架构无关的页表项标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u8 {
        /// 映射有效
        const VALID = 1 << 0;
        /// 可写
        const WRITABLE = 1 << 1;
        /// 用户态可访问
        const USER = 1 << 2;
        /// 硬件访问位
        const ACCESSED = 1 << 3;
        /// 硬件脏位
        const DIRTY = 1 << 4;
    }
}

/// 单个进程的硬件页表
///
/// 所有方法都以 `&self` 调用，实现内部负责同步。
pub trait PageTable: Send + Sync {
    /// 建立 `vpn -> ppn` 的用户映射
    ///
    /// 新映射的访问位和脏位均为清除状态。
    fn map(&self, vpn: Vpn, ppn: Ppn, writable: bool) -> VmResult<()>;

    /// 解除映射；未映射时什么也不做
    fn unmap(&self, vpn: Vpn);

    /// 查询映射
    fn walk(&self, vpn: Vpn) -> Option<(Ppn, PteFlags)>;

    /// 用 `flags` 替换已存在映射的标志位
    fn update_flags(&self, vpn: Vpn, flags: PteFlags) -> VmResult<()>;

    /// 访问位是否置位；未映射视为未访问
    fn is_accessed(&self, vpn: Vpn) -> bool {
        self.walk(vpn)
            .is_some_and(|(_, flags)| flags.contains(PteFlags::ACCESSED))
    }

    /// 设置或清除访问位
    fn set_accessed(&self, vpn: Vpn, accessed: bool) {
        if let Some((_, mut flags)) = self.walk(vpn) {
            flags.set(PteFlags::ACCESSED, accessed);
            let updated = self.update_flags(vpn, flags);
            debug_assert!(updated.is_ok());
        }
    }

    /// 脏位是否置位；未映射视为干净
    fn is_dirty(&self, vpn: Vpn) -> bool {
        self.walk(vpn)
            .is_some_and(|(_, flags)| flags.contains(PteFlags::DIRTY))
    }

    /// 设置或清除脏位
    fn set_dirty(&self, vpn: Vpn, dirty: bool) {
        if let Some((_, mut flags)) = self.walk(vpn) {
            flags.set(PteFlags::DIRTY, dirty);
            let updated = self.update_flags(vpn, flags);
            debug_assert!(updated.is_ok());
        }
    }
}
