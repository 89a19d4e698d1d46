//! 进程地址空间
//!
//! [`AddressSpace`] 把一个进程的补充页表、硬件页表、栈底和影子栈指针
//! 绑在一起，是进程管理代码与虚拟内存核心交互的入口。

use alloc::sync::Arc;
use core::cmp::min;

use crate::address::{AlignOps, PageNum, UsizeConvert, Vaddr, Vpn};
use crate::arch_ops::frame_bytes;
use crate::config::{vm_config, PAGE_SIZE};
use crate::error::{VmError, VmResult};
use crate::file::{BackingFile, LazyLoad};
use crate::manager::Vm;
use crate::page::{Backing, Page, PageKind, Pid, UninitPage};
use crate::page_table::PageTable;
use crate::spt::SupplementalPageTable;

/// 页面内容的来源
pub(crate) enum Populate<'a> {
    /// 通过后端换入或初始化
    Backend,
    /// 复制另一页面的内容（fork）
    CopyFrom(&'a Page),
}

/// 进程地址空间
pub struct AddressSpace {
    pub(crate) vm: Arc<Vm>,
    pid: Pid,
    page_table: Arc<dyn PageTable>,
    pub(crate) spt: SupplementalPageTable,
    /// 最低栈页的起始地址
    pub(crate) stack_bottom: Vaddr,
    /// 系统调用入口记录的用户栈指针
    pub(crate) user_rsp: Vaddr,
}

impl AddressSpace {
    /// 创建空地址空间
    pub fn new(vm: Arc<Vm>, pid: Pid, page_table: Arc<dyn PageTable>) -> Self {
        let top = Vaddr::from_usize(vm_config().user_stack_top());
        Self {
            vm,
            pid,
            page_table,
            spt: SupplementalPageTable::new(),
            stack_bottom: top,
            user_rsp: top,
        }
    }

    /// 所属进程
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// 虚拟内存管理器
    pub fn vm(&self) -> &Arc<Vm> {
        &self.vm
    }

    /// 硬件页表
    pub fn page_table(&self) -> &Arc<dyn PageTable> {
        &self.page_table
    }

    /// 补充页表
    pub fn spt(&self) -> &SupplementalPageTable {
        &self.spt
    }

    /// 当前最低栈页的起始地址
    pub fn stack_bottom(&self) -> Vaddr {
        self.stack_bottom
    }

    /// 记录系统调用入口时的用户栈指针
    pub fn set_user_rsp(&mut self, rsp: usize) {
        self.user_rsp = Vaddr::from_usize(rsp);
    }

    /// 影子用户栈指针
    pub fn user_rsp(&self) -> Vaddr {
        self.user_rsp
    }

    /// 查找包含 `va` 的页面
    pub fn find_page(&self, va: Vaddr) -> Option<Arc<Page>> {
        self.spt.find(va)
    }

    /// 注册一个未初始化页面
    ///
    /// 页面在首次缺页时按 `kind` 初始化：有 `init` 时从文件读取内容，
    /// 否则为全零。文件映射页必须提供 `init`。
    pub fn alloc_page_with_initializer(
        &mut self,
        kind: PageKind,
        va: Vaddr,
        writable: bool,
        init: Option<LazyLoad>,
    ) -> VmResult<()> {
        if kind == PageKind::File && init.is_none() {
            return Err(VmError::InvalidAccess);
        }
        let backing = Backing::Uninit(UninitPage::new(kind, init));
        self.register(Page::new(
            Vpn::from_addr_floor(va),
            writable,
            self.pid,
            self.page_table.clone(),
            backing,
        ))
        .map(|_| ())
    }

    /// 注册一个没有懒加载内容的页面
    pub fn alloc_page(&mut self, kind: PageKind, va: Vaddr, writable: bool) -> VmResult<()> {
        self.alloc_page_with_initializer(kind, va, writable, None)
    }

    pub(crate) fn register(&mut self, page: Page) -> VmResult<Arc<Page>> {
        let page = Arc::new(page);
        if !self.spt.insert(page.clone()) {
            return Err(VmError::AlreadyMapped);
        }
        log::trace!("vm: pid {} registered {:?}", self.pid, page.vpn());
        Ok(page)
    }

    /// 立即为包含 `va` 的页面分配帧并装入内容
    pub fn claim_page(&mut self, va: Vaddr) -> VmResult<()> {
        let page = self.spt.find(va).ok_or(VmError::NotMapped)?;
        self.claim(&page, Populate::Backend)
    }

    /// 为页面获取帧、建立映射并填充内容
    ///
    /// 帧在填充期间保持 pinned；失败时映射被撤销，帧归还分配器。
    pub(crate) fn claim(&self, page: &Arc<Page>, source: Populate<'_>) -> VmResult<()> {
        if page.is_resident() {
            return Ok(());
        }
        let vm = &self.vm;
        let ppn = vm.frames().acquire_frame(vm.swap());

        let result = {
            let mut state = page.state.lock();
            debug_assert!(state.frame.is_none());
            match page.owner().map(page.vpn(), ppn, page.writable()) {
                Err(e) => Err(e),
                Ok(()) => {
                    state.frame = Some(ppn);
                    let filled = match source {
                        Populate::Backend => state.backing.swap_in(&page.io(vm.swap()), ppn),
                        Populate::CopyFrom(parent) => {
                            // SAFETY: 帧处于 pinned 状态，由当前调用者独占
                            parent
                                .copy_content_into(vm.swap(), unsafe { frame_bytes(ppn) })
                                .map(|dirty| {
                                    // 新映射是干净的；父页未写回的修改必须随副本保留
                                    if dirty {
                                        page.owner().set_dirty(page.vpn(), true);
                                    }
                                })
                        }
                    };
                    match filled {
                        Ok(()) => page.set_accessed(true),
                        Err(_) => {
                            state.frame = None;
                            page.owner().unmap(page.vpn());
                        }
                    }
                    filled
                }
            }
        };

        match result {
            Ok(()) => {
                vm.frames().install(ppn, page);
                log::trace!("vm: pid {} claimed {:?} -> {:?}", self.pid, page.vpn(), ppn);
                Ok(())
            }
            Err(e) => {
                vm.frames().release_frame(ppn);
                Err(e)
            }
        }
    }

    /// 移除包含 `va` 的页面
    pub fn remove_page(&mut self, va: Vaddr) -> VmResult<()> {
        self.spt
            .remove(&self.vm, va)
            .map(|_| ())
            .ok_or(VmError::NotMapped)
    }

    /// 为可执行文件的一个段注册懒加载页面
    ///
    /// 从 `offset` 开始的 `read_bytes` 字节映射到 `upage`，其后的 `zero_bytes`
    /// 字节清零。每页拥有独立的描述符。
    pub fn load_segment(
        &mut self,
        file: &Arc<dyn BackingFile>,
        mut offset: usize,
        mut upage: Vaddr,
        mut read_bytes: usize,
        mut zero_bytes: usize,
        writable: bool,
    ) -> VmResult<()> {
        debug_assert!((read_bytes + zero_bytes) % PAGE_SIZE == 0);
        debug_assert!(upage.is_page_aligned());

        while read_bytes > 0 || zero_bytes > 0 {
            let page_read_bytes = min(read_bytes, PAGE_SIZE);
            let page_zero_bytes = PAGE_SIZE - page_read_bytes;

            let init = LazyLoad::new(file.clone(), offset, page_read_bytes);
            self.alloc_page_with_initializer(PageKind::Anon, upage, writable, Some(init))?;

            read_bytes -= page_read_bytes;
            zero_bytes -= page_zero_bytes;
            offset += page_read_bytes;
            upage = Vaddr::from_usize(upage.as_usize() + PAGE_SIZE);
        }
        Ok(())
    }

    /// 建立初始用户栈：分配并立即装入最高的栈页，返回初始栈指针
    pub fn setup_stack(&mut self) -> VmResult<usize> {
        let top = vm_config().user_stack_top();
        let bottom = Vaddr::from_usize(top - PAGE_SIZE);
        let page = Page::new(
            Vpn::from_addr_floor(bottom),
            true,
            self.pid,
            self.page_table.clone(),
            Backing::Uninit(UninitPage::new(PageKind::Anon, None)),
        )
        .with_stack_marker();
        let page = self.register(page)?;
        if let Err(e) = self.claim(&page, Populate::Backend) {
            self.spt.remove(&self.vm, bottom);
            return Err(e);
        }
        self.stack_bottom = bottom;
        self.user_rsp = Vaddr::from_usize(top);
        Ok(top)
    }

    /// 从用户地址 `va` 读取数据
    ///
    /// 经过的页面必须驻留，并被标记为已访问。
    pub fn read_bytes_at(&self, va: Vaddr, buf: &mut [u8]) -> VmResult<()> {
        let mut done = 0;
        while done < buf.len() {
            let addr = va.checked_add(done).ok_or(VmError::InvalidAccess)?;
            let page = self.spt.find(addr).ok_or(VmError::NotMapped)?;
            let offset = addr.page_offset();
            let len = min(PAGE_SIZE - offset, buf.len() - done);

            let state = page.state.lock();
            let ppn = state.frame.ok_or(VmError::NotMapped)?;
            // SAFETY: 持有页面锁，驻留帧不会被驱逐
            let src = unsafe { frame_bytes(ppn) };
            buf[done..done + len].copy_from_slice(&src[offset..offset + len]);
            page.set_accessed(true);
            drop(state);

            done += len;
        }
        Ok(())
    }

    /// 向用户地址 `va` 写入数据
    ///
    /// 经过的页面必须驻留且可写，并被标记为已访问和脏。
    pub fn write_bytes_at(&self, va: Vaddr, data: &[u8]) -> VmResult<()> {
        let mut done = 0;
        while done < data.len() {
            let addr = va.checked_add(done).ok_or(VmError::InvalidAccess)?;
            let page = self.spt.find(addr).ok_or(VmError::NotMapped)?;
            if !page.writable() {
                return Err(VmError::ProtectionViolation);
            }
            let offset = addr.page_offset();
            let len = min(PAGE_SIZE - offset, data.len() - done);

            let state = page.state.lock();
            let ppn = state.frame.ok_or(VmError::NotMapped)?;
            // SAFETY: 持有页面锁，驻留帧不会被驱逐
            let dst = unsafe { frame_bytes(ppn) };
            dst[offset..offset + len].copy_from_slice(&data[done..done + len]);
            page.set_accessed(true);
            page.owner().set_dirty(page.vpn(), true);
            drop(state);

            done += len;
        }
        Ok(())
    }

    /// 拆除地址空间中的所有页面
    pub fn kill(&mut self) {
        if !self.spt.is_empty() {
            log::debug!("vm: pid {} tearing down {} pages", self.pid, self.spt.len());
        }
        self.spt.kill(&self.vm);
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        self.kill();
    }
}
