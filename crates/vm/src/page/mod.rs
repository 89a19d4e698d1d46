//! 页面及其后端
//!
//! 每个 [`Page`] 描述进程地址空间中的一个虚拟页：权限、所属进程、
//! 可选的驻留帧，以及决定内容从哪里来、换出到哪里去的后端状态 [`Backing`]。
//!
//! 后端有三种：
//! - [`UninitPage`]：尚未首次访问的页面，持有懒加载描述符
//! - [`AnonPage`]：匿名页，换出到交换设备
//! - [`FilePage`]：文件映射页，脏页写回文件
//!
//! 两种具体类型都先以 `Uninit` 形态创建，首次缺页时原地转换为具体类型，且只转换一次。

mod anon;
mod file;
mod uninit;

pub use anon::AnonPage;
pub use file::FilePage;
pub use uninit::UninitPage;

use alloc::sync::Arc;
use core::fmt;

use sync::SpinMutex;

use crate::address::{PageNum, Ppn, Vaddr, Vpn};
use crate::arch_ops::frame_bytes;
use crate::error::VmResult;
use crate::page_table::PageTable;
use crate::swap::{SwapSlot, SwapTable};

/// 进程标识
pub type Pid = usize;

/// 页面的声明类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// 匿名页
    Anon,
    /// 文件映射页
    File,
}

/// 后端操作所需的页面上下文
pub(crate) struct PageIo<'a> {
    pub(crate) vpn: Vpn,
    pub(crate) owner: &'a dyn PageTable,
    pub(crate) swap: &'a SwapTable,
}

/// 具体后端的能力集合
pub(crate) trait Backend {
    /// 将内容装入 `frame`
    fn swap_in(&mut self, io: &PageIo<'_>, frame: Ppn) -> VmResult<()>;

    /// 持久化 `frame` 中的内容，并解除页面映射
    fn swap_out(&mut self, io: &PageIo<'_>, frame: Ppn) -> VmResult<()>;

    /// 释放后端私有资源；`frame` 是页面当前的驻留帧
    fn destroy(&mut self, io: &PageIo<'_>, frame: Option<Ppn>);

    /// 不改变后端状态地读取非驻留内容到 `dst`
    fn peek(&self, io: &PageIo<'_>, dst: &mut [u8]) -> VmResult<()>;
}

/// 页面后端状态
#[derive(Debug)]
pub enum Backing {
    /// 尚未初始化
    Uninit(UninitPage),
    /// 匿名页
    Anon(AnonPage),
    /// 文件映射页
    File(FilePage),
}

impl Backing {
    /// 声明类型
    pub fn kind(&self) -> PageKind {
        match self {
            Backing::Uninit(uninit) => uninit.kind(),
            Backing::Anon(_) => PageKind::Anon,
            Backing::File(_) => PageKind::File,
        }
    }

    /// 换入；未初始化的页面在此完成到具体类型的转换
    pub(crate) fn swap_in(&mut self, io: &PageIo<'_>, frame: Ppn) -> VmResult<()> {
        match self {
            Backing::Uninit(uninit) => {
                *self = uninit.clone().initialize(frame)?;
                Ok(())
            }
            Backing::Anon(anon) => anon.swap_in(io, frame),
            Backing::File(file) => file.swap_in(io, frame),
        }
    }

    pub(crate) fn swap_out(&mut self, io: &PageIo<'_>, frame: Ppn) -> VmResult<()> {
        match self {
            // 未初始化的页面从不驻留
            Backing::Uninit(_) => unreachable!("vm: swap_out on uninitialized page"),
            Backing::Anon(anon) => anon.swap_out(io, frame),
            Backing::File(file) => file.swap_out(io, frame),
        }
    }

    pub(crate) fn destroy(&mut self, io: &PageIo<'_>, frame: Option<Ppn>) {
        match self {
            Backing::Uninit(_) => {}
            Backing::Anon(anon) => anon.destroy(io, frame),
            Backing::File(file) => file.destroy(io, frame),
        }
    }

    pub(crate) fn peek(&self, io: &PageIo<'_>, dst: &mut [u8]) -> VmResult<()> {
        match self {
            Backing::Uninit(uninit) => uninit.peek(dst),
            Backing::Anon(anon) => anon.peek(io, dst),
            Backing::File(file) => file.peek(io, dst),
        }
    }

    /// fork 时为子进程创建同类型的空后端
    pub(crate) fn fork_empty(&self) -> Backing {
        match self {
            Backing::Uninit(uninit) => Backing::Uninit(uninit.clone()),
            Backing::Anon(_) => Backing::Anon(AnonPage::new()),
            Backing::File(file) => Backing::File(file.clone()),
        }
    }
}

/// 受页面锁保护的可变状态
pub(crate) struct PageState {
    pub(crate) frame: Option<Ppn>,
    pub(crate) backing: Backing,
}

/// 进程地址空间中的一个虚拟页
pub struct Page {
    vpn: Vpn,
    writable: bool,
    stack: bool,
    pid: Pid,
    owner: Arc<dyn PageTable>,
    pub(crate) state: SpinMutex<PageState>,
}

impl Page {
    pub(crate) fn new(
        vpn: Vpn,
        writable: bool,
        pid: Pid,
        owner: Arc<dyn PageTable>,
        backing: Backing,
    ) -> Self {
        Self {
            vpn,
            writable,
            stack: false,
            pid,
            owner,
            state: SpinMutex::new(PageState {
                frame: None,
                backing,
            }),
        }
    }

    pub(crate) fn with_stack_marker(mut self) -> Self {
        self.stack = true;
        self
    }

    /// 虚拟页号
    pub fn vpn(&self) -> Vpn {
        self.vpn
    }

    /// 页面起始地址
    pub fn va(&self) -> Vaddr {
        self.vpn.start_addr()
    }

    /// 是否可写
    pub fn writable(&self) -> bool {
        self.writable
    }

    /// 是否为栈页
    pub fn is_stack(&self) -> bool {
        self.stack
    }

    /// 所属进程
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// 声明类型
    pub fn kind(&self) -> PageKind {
        self.state.lock().backing.kind()
    }

    /// 是否仍处于未初始化状态
    pub fn is_uninit(&self) -> bool {
        matches!(self.state.lock().backing, Backing::Uninit(_))
    }

    /// 驻留帧
    pub fn frame(&self) -> Option<Ppn> {
        self.state.lock().frame
    }

    /// 是否驻留在物理内存中
    pub fn is_resident(&self) -> bool {
        self.frame().is_some()
    }

    /// 换出后占用的交换槽
    pub fn swap_slot(&self) -> Option<SwapSlot> {
        match &self.state.lock().backing {
            Backing::Anon(anon) => anon.slot(),
            _ => None,
        }
    }

    pub(crate) fn owner(&self) -> &dyn PageTable {
        self.owner.as_ref()
    }

    pub(crate) fn io<'a>(&'a self, swap: &'a SwapTable) -> PageIo<'a> {
        PageIo {
            vpn: self.vpn,
            owner: self.owner.as_ref(),
            swap,
        }
    }

    /// 硬件访问位
    pub fn is_accessed(&self) -> bool {
        self.owner.is_accessed(self.vpn)
    }

    pub(crate) fn set_accessed(&self, accessed: bool) {
        self.owner.set_accessed(self.vpn, accessed);
    }

    /// 把当前内容复制到 `dst`，不改变本页的任何状态
    ///
    /// 驻留时直接复制帧，否则从后备存储读取。
    ///
    /// 返回复制的内容是否比后备存储更新（驻留且 PTE 为脏）。
    pub(crate) fn copy_content_into(&self, swap: &SwapTable, dst: &mut [u8]) -> VmResult<bool> {
        let state = self.state.lock();
        match state.frame {
            Some(ppn) => {
                // SAFETY: 持有页面锁，驻留帧不会被驱逐或释放
                dst.copy_from_slice(unsafe { frame_bytes(ppn) });
                Ok(self.owner.is_dirty(self.vpn))
            }
            None => state.backing.peek(&self.io(swap), dst).map(|()| false),
        }
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("vpn", &self.vpn)
            .field("writable", &self.writable)
            .field("stack", &self.stack)
            .field("pid", &self.pid)
            .finish()
    }
}
