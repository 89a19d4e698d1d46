//! 缺页处理
//!
//! 一次缺页按以下顺序分类，结论只取决于本次缺页时的状态：
//!
//! 1. 内核地址：拒绝
//! 2. 对已存在映射的权限违例：拒绝，不分配任何页面
//! 3. 补充页表中存在页面：写只读页拒绝，否则装入该页（懒加载或换入）
//! 4. 地址落在栈增长范围内：在栈底下方新增一个匿名页并装入
//! 5. 其他情况：拒绝

use crate::address::{PageNum, UsizeConvert, Vaddr, Vpn};
use crate::config::{vm_config, PAGE_SIZE};
use crate::error::{VmError, VmResult};
use crate::page::{Backing, Page, PageKind, UninitPage};
use crate::space::{AddressSpace, Populate};

/// 一次缺页的描述
#[derive(Debug, Clone, Copy)]
pub struct PageFault {
    /// 缺页地址
    pub addr: Vaddr,
    /// 缺页发生在用户态
    pub user: bool,
    /// 写访问
    pub write: bool,
    /// 页面不存在（否则为权限违例）
    pub not_present: bool,
    /// 陷阱帧中的栈指针
    pub rsp: usize,
}

impl AddressSpace {
    /// 处理一次缺页
    pub fn handle_fault(&mut self, fault: &PageFault) -> VmResult<()> {
        let cfg = vm_config();
        let addr = fault.addr;

        if cfg.is_kernel_vaddr(addr.as_usize()) {
            return Err(VmError::KernelAddress);
        }
        if !fault.not_present {
            return Err(VmError::ProtectionViolation);
        }

        if let Some(page) = self.spt.find(addr) {
            if fault.write && !page.writable() {
                return Err(VmError::ProtectionViolation);
            }
            return self.claim(&page, Populate::Backend);
        }

        // 内核态缺页时陷阱帧里是内核栈指针，改用系统调用入口记录的用户栈指针
        let rsp = if fault.user {
            fault.rsp
        } else {
            self.user_rsp.as_usize()
        };
        if is_stack_access(addr.as_usize(), rsp) {
            let page = self.grow_stack()?;
            return self.claim(&page, Populate::Backend);
        }

        Err(VmError::InvalidAccess)
    }

    /// 在当前栈底下方增加一个栈页
    fn grow_stack(&mut self) -> VmResult<alloc::sync::Arc<Page>> {
        let cfg = vm_config();
        let new_bottom = self
            .stack_bottom
            .as_usize()
            .checked_sub(PAGE_SIZE)
            .filter(|&bottom| bottom >= cfg.stack_limit())
            .ok_or(VmError::InvalidAccess)?;

        let page = Page::new(
            Vpn::from_usize(new_bottom / PAGE_SIZE),
            true,
            self.pid(),
            self.page_table().clone(),
            Backing::Uninit(UninitPage::new(PageKind::Anon, None)),
        )
        .with_stack_marker();
        let page = self.register(page)?;
        self.stack_bottom = page.vpn().start_addr();
        log::debug!(
            "vm: pid {} stack grown to {:#x}",
            self.pid(),
            self.stack_bottom
        );
        Ok(page)
    }
}

/// 地址是否落在栈增长范围内
///
/// 低于栈顶，不低于栈顶减去最大栈大小，且不低于 `rsp` 减去允许的余量。
fn is_stack_access(addr: usize, rsp: usize) -> bool {
    let cfg = vm_config();
    addr < cfg.user_stack_top()
        && addr >= cfg.stack_limit()
        && addr >= rsp.saturating_sub(cfg.stack_growth_slack())
}

/// 陷阱分发器使用的缺页入口
///
/// 返回 `true` 表示缺页已解决；否则记录原因，由调用者终止进程。
pub fn vm_try_handle_fault(
    space: &mut AddressSpace,
    trap_rsp: usize,
    addr: usize,
    user: bool,
    write: bool,
    not_present: bool,
) -> bool {
    let fault = PageFault {
        addr: Vaddr::from_usize(addr),
        user,
        write,
        not_present,
        rsp: trap_rsp,
    };
    match space.handle_fault(&fault) {
        Ok(()) => true,
        Err(e) => {
            log::warn!(
                "vm: pid {} unresolved fault at {:#x} (user={}, write={}): {}",
                space.pid(),
                addr,
                user,
                write,
                e
            );
            false
        }
    }
}
