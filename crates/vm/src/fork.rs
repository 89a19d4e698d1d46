//! fork 时复制地址空间
//!
//! 子进程的每个页面与父进程同址、同权限、同类型。未初始化页面共享同一个
//! 懒加载描述符；其余页面在子进程中获得独立的帧并复制父进程的内容，
//! 不与父进程共享物理内存。
//!
//! 父进程通过 [`ForkHandshake`] 阻塞等待子进程报告复制结果。

use alloc::sync::Arc;

use sync::Completion;

use crate::error::VmResult;
use crate::page::{Backing, Page, Pid};
use crate::page_table::PageTable;
use crate::space::{AddressSpace, Populate};

impl AddressSpace {
    /// 用 `parent` 的内容填充本地址空间（必须为空）
    ///
    /// 任何一页失败都会拆除已复制的部分并返回错误。
    pub fn copy_from(&mut self, parent: &AddressSpace) -> VmResult<()> {
        debug_assert!(self.spt.is_empty());
        if let Err(e) = self.copy_pages(parent) {
            log::debug!(
                "vm: fork of pid {} into pid {} failed: {}",
                parent.pid(),
                self.pid(),
                e
            );
            self.kill();
            return Err(e);
        }
        self.stack_bottom = parent.stack_bottom;
        self.user_rsp = parent.user_rsp;
        log::debug!(
            "vm: pid {} copied {} pages from pid {}",
            self.pid(),
            self.spt.len(),
            parent.pid()
        );
        Ok(())
    }

    fn copy_pages(&mut self, parent: &AddressSpace) -> VmResult<()> {
        for parent_page in parent.spt.iter() {
            let backing = parent_page.state.lock().backing.fork_empty();
            let needs_copy = !matches!(backing, Backing::Uninit(_));

            let mut page = Page::new(
                parent_page.vpn(),
                parent_page.writable(),
                self.pid(),
                self.page_table().clone(),
                backing,
            );
            if parent_page.is_stack() {
                page = page.with_stack_marker();
            }
            let page = self.register(page)?;

            if needs_copy {
                self.claim(&page, Populate::CopyFrom(parent_page))?;
            }
        }
        Ok(())
    }

    /// 创建 `parent` 的副本作为新进程的地址空间
    pub fn duplicate(
        &self,
        child_pid: Pid,
        child_page_table: Arc<dyn PageTable>,
    ) -> VmResult<AddressSpace> {
        let mut child = AddressSpace::new(self.vm.clone(), child_pid, child_page_table);
        child.copy_from(self)?;
        Ok(child)
    }
}

/// 父子进程间的一次性握手
///
/// 父进程创建握手并启动子进程后调用 [`ForkHandshake::wait`]；子进程在
/// [`ForkHandshake::run_child`] 中复制父进程的地址空间并报告结果。
/// 父进程在等待期间不会修改自己的地址空间。
#[derive(Default)]
pub struct ForkHandshake {
    done: Completion<VmResult<()>>,
}

impl ForkHandshake {
    /// 创建握手
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 子进程侧：复制地址空间并通知父进程
    pub fn run_child(&self, parent: &AddressSpace, child: &mut AddressSpace) -> VmResult<()> {
        let result = child.copy_from(parent);
        self.done.complete(result);
        result
    }

    /// 父进程侧：阻塞直到子进程报告复制结果
    pub fn wait(&self) -> VmResult<()> {
        self.done.wait()
    }
}

/// 把 `src` 的补充页表复制到 `dst`，成功返回 `true`
pub fn supplemental_page_table_copy(dst: &mut AddressSpace, src: &AddressSpace) -> bool {
    dst.copy_from(src).is_ok()
}
