//! 补充页表
//!
//! 每个进程一张，以页对齐的虚拟页号为键记录该进程的所有 [`Page`]。
//! 硬件页表只描述驻留的页面，补充页表还记录尚未加载和已被换出的页面，
//! 缺页处理依靠它判断一次缺页应当如何解决。

use alloc::sync::Arc;

use hashbrown::HashMap;

use crate::address::{PageNum, Vaddr, Vpn};
use crate::manager::Vm;
use crate::page::Page;

/// 补充页表
#[derive(Default)]
pub struct SupplementalPageTable {
    pages: HashMap<Vpn, Arc<Page>>,
}

impl SupplementalPageTable {
    /// 创建空表
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
        }
    }

    /// 查找包含 `va` 的页面
    pub fn find(&self, va: Vaddr) -> Option<Arc<Page>> {
        self.pages.get(&Vpn::from_addr_floor(va)).cloned()
    }

    /// 插入页面；该地址已有页面时返回 `false`，不覆盖
    pub fn insert(&mut self, page: Arc<Page>) -> bool {
        match self.pages.entry(page.vpn()) {
            hashbrown::hash_map::Entry::Occupied(_) => false,
            hashbrown::hash_map::Entry::Vacant(slot) => {
                slot.insert(page);
                true
            }
        }
    }

    /// 移除包含 `va` 的页面
    ///
    /// 页面被解除映射并从表中删除，其驻留帧保留在帧表中但不再有占用者，
    /// 后端私有资源随之释放。返回被移除的页面。
    pub fn remove(&mut self, vm: &Vm, va: Vaddr) -> Option<Arc<Page>> {
        let page = self.pages.remove(&Vpn::from_addr_floor(va))?;
        vm.frames().teardown(&page, vm.swap(), false);
        Some(page)
    }

    /// 拆除整张表：逐页写回、解除映射并归还帧
    pub fn kill(&mut self, vm: &Vm) {
        for (_, page) in self.pages.drain() {
            vm.frames().teardown(&page, vm.swap(), true);
        }
    }

    /// 页面数
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// 遍历所有页面，顺序不确定
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Page>> {
        self.pages.values()
    }
}
