//! 二次机会时钟算法

use alloc::vec::Vec;

use super::FrameTableInner;
use crate::address::{PageNum, Ppn};

impl FrameTableInner {
    /// 从时钟指针开始扫描，选出一个牺牲帧
    ///
    /// - pinned 帧跳过
    /// - 无占用者的帧立即选中
    /// - 访问位置位的帧清除访问位后跳过，访问位清除的帧选中
    ///
    /// 转满一圈仍未选中时，强制选择起始位置的帧（若它被 pinned，则取其后第一个
    /// 未 pinned 的帧）。选中后指针停在牺牲帧之后。
    ///
    /// # Panics
    /// 所有帧都处于 pinned 状态
    pub(super) fn select_victim(&mut self) -> Ppn {
        let order: Vec<Ppn> = self
            .entries
            .range(self.cursor..)
            .chain(self.entries.range(..self.cursor))
            .map(|(ppn, _)| *ppn)
            .collect();

        let mut victim = None;
        for &ppn in &order {
            let entry = &self.entries[&ppn];
            if entry.pinned {
                continue;
            }
            let Some(page) = entry.occupant() else {
                victim = Some(ppn);
                break;
            };
            if page.is_accessed() {
                page.set_accessed(false);
                log::trace!("vm: clock gives {:?} a second chance", page.vpn());
                continue;
            }
            victim = Some(ppn);
            break;
        }

        let victim = victim
            .or_else(|| order.iter().copied().find(|ppn| !self.entries[ppn].pinned))
            .unwrap_or_else(|| {
                log::error!("vm: all {} frames are pinned", order.len());
                panic!("vm: out of physical frames");
            });

        self.cursor = victim.next();
        victim
    }
}
