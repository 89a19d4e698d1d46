//! 帧表
//!
//! 记录所有交给用户页面使用的物理帧，以及每个帧当前的占用者。
//! 帧池耗尽时由二次机会时钟算法（见 `clock` 子模块）选出牺牲帧并回收。
//!
//! # 锁顺序
//!
//! 帧表锁总是先于页面锁获取：驱逐和拆除都在持有帧表锁时锁住页面。
//! 任何路径都不会在持有页面锁时请求帧表锁。
//!
//! # 固定帧
//!
//! [`FrameTable::acquire_frame`] 返回的帧处于 pinned 状态，直到
//! [`FrameTable::install`] 记录占用者。填充内容期间不持有帧表锁，
//! pinned 帧不会被选为牺牲帧。

mod clock;

use alloc::collections::BTreeMap;
use alloc::sync::{Arc, Weak};

use sync::SpinLock;

use crate::address::{Ppn, UsizeConvert};
use crate::arch_ops::clear_frame;
use crate::frame_allocator::FrameAllocator;
use crate::page::Page;
use crate::swap::SwapTable;

/// 帧表中的一项
struct FrameEntry {
    /// 占用此帧的页面；`None` 表示帧被跟踪但空闲
    page: Option<Weak<Page>>,
    /// 填充中，不可驱逐
    pinned: bool,
}

impl FrameEntry {
    fn occupant(&self) -> Option<Arc<Page>> {
        self.page.as_ref().and_then(Weak::upgrade)
    }
}

struct FrameTableInner {
    allocator: FrameAllocator,
    entries: BTreeMap<Ppn, FrameEntry>,
    /// 时钟指针：下一次扫描从第一个不小于它的帧开始
    cursor: Ppn,
}

/// 帧表统计信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// 帧池容量
    pub capacity: usize,
    /// 被跟踪的帧数
    pub tracked: usize,
    /// 有占用者的帧数
    pub occupied: usize,
    /// 处于 pinned 状态的帧数
    pub pinned: usize,
}

/// 全局帧表
pub struct FrameTable {
    inner: SpinLock<FrameTableInner>,
}

impl FrameTable {
    /// 在分配器管理的帧池上建立帧表
    pub fn new(allocator: FrameAllocator) -> Self {
        Self {
            inner: SpinLock::new(FrameTableInner {
                allocator,
                entries: BTreeMap::new(),
                cursor: Ppn::from_usize(0),
            }),
        }
    }

    /// 获取一个清零的帧
    ///
    /// 帧池有空闲帧时直接分配，否则驱逐一个页面。返回的帧处于 pinned 状态，
    /// 没有占用者。
    ///
    /// # Panics
    /// 所有被跟踪的帧都处于 pinned 状态，或牺牲页换出失败
    pub fn acquire_frame(&self, swap: &SwapTable) -> Ppn {
        let mut inner = self.inner.lock();
        let ppn = match inner.allocator.alloc() {
            Some(ppn) => ppn,
            None => inner.evict(swap),
        };
        clear_frame(ppn);
        inner.entries.insert(
            ppn,
            FrameEntry {
                page: None,
                pinned: true,
            },
        );
        ppn
    }

    /// 记录 `ppn` 的占用者并解除 pinned
    pub fn install(&self, ppn: Ppn, page: &Arc<Page>) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(&ppn) {
            entry.page = Some(Arc::downgrade(page));
            entry.pinned = false;
        }
    }

    /// 将帧标记为无占用者，帧仍被跟踪
    pub fn detach(&self, ppn: Ppn) {
        self.inner.lock().detach(ppn);
    }

    /// 将帧从帧表移除并归还分配器
    pub fn release_frame(&self, ppn: Ppn) {
        self.inner.lock().release(ppn);
    }

    /// 拆除页面：销毁后端、解除映射，然后释放（`release`）或分离其驻留帧
    pub(crate) fn teardown(&self, page: &Page, swap: &SwapTable, release: bool) {
        let mut inner = self.inner.lock();
        let mut state = page.state.lock();
        let frame = state.frame.take();
        state.backing.destroy(&page.io(swap), frame);
        page.owner().unmap(page.vpn());
        drop(state);
        if let Some(ppn) = frame {
            if release {
                inner.release(ppn);
            } else {
                inner.detach(ppn);
            }
        }
    }

    /// 帧的当前占用者
    pub fn occupant(&self, ppn: Ppn) -> Option<Arc<Page>> {
        self.inner.lock().entries.get(&ppn)?.occupant()
    }

    /// 帧是否被跟踪
    pub fn contains(&self, ppn: Ppn) -> bool {
        self.inner.lock().entries.contains_key(&ppn)
    }

    /// 被跟踪的帧数
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// 没有被跟踪的帧
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 帧池容量
    pub fn capacity(&self) -> usize {
        self.inner.lock().allocator.total_frames()
    }

    /// 统计信息
    pub fn stats(&self) -> FrameStats {
        let inner = self.inner.lock();
        let mut stats = FrameStats {
            capacity: inner.allocator.total_frames(),
            tracked: inner.entries.len(),
            occupied: 0,
            pinned: 0,
        };
        for entry in inner.entries.values() {
            if entry.pinned {
                stats.pinned += 1;
            }
            if entry.occupant().is_some() {
                stats.occupied += 1;
            }
        }
        stats
    }
}

impl FrameTableInner {
    fn detach(&mut self, ppn: Ppn) {
        if let Some(entry) = self.entries.get_mut(&ppn) {
            entry.page = None;
            entry.pinned = false;
        }
    }

    fn release(&mut self, ppn: Ppn) {
        if self.entries.remove(&ppn).is_some() {
            self.allocator.dealloc(ppn);
        }
    }

    /// 选出牺牲帧，换出其占用者并解除双向引用
    fn evict(&mut self, swap: &SwapTable) -> Ppn {
        let ppn = self.select_victim();
        let occupant = self.entries.get_mut(&ppn).and_then(|entry| {
            entry.pinned = true;
            entry.page.take().and_then(|weak| weak.upgrade())
        });

        if let Some(page) = occupant {
            let mut state = page.state.lock();
            if state.frame == Some(ppn) {
                if let Err(e) = state.backing.swap_out(&page.io(swap), ppn) {
                    log::error!(
                        "vm: failed to swap out {:?} of pid {}: {}",
                        page.vpn(),
                        page.pid(),
                        e
                    );
                    panic!("vm: eviction failed: {}", e);
                }
                state.frame = None;
            }
            log::debug!(
                "vm: evicted {:?} of pid {} from {:?}",
                page.vpn(),
                page.pid(),
                ppn
            );
        }
        ppn
    }
}
