//! 匿名页后端

use super::{Backend, PageIo};
use crate::address::Ppn;
use crate::arch_ops::frame_bytes;
use crate::error::VmResult;
use crate::swap::SwapSlot;

/// 匿名页
///
/// 没有文件后备，被驱逐时写入交换设备；从未换出过的页面换入时为全零。
#[derive(Debug, Default)]
pub struct AnonPage {
    slot: Option<SwapSlot>,
}

impl AnonPage {
    pub(crate) fn new() -> Self {
        Self { slot: None }
    }

    /// 当前占用的交换槽
    pub fn slot(&self) -> Option<SwapSlot> {
        self.slot
    }
}

impl Backend for AnonPage {
    fn swap_in(&mut self, io: &PageIo<'_>, frame: Ppn) -> VmResult<()> {
        // SAFETY: 帧在填充期间处于 pinned 状态
        let dst = unsafe { frame_bytes(frame) };
        match self.slot {
            Some(slot) => {
                io.swap.read(slot, dst)?;
                io.swap.free(slot);
                self.slot = None;
            }
            None => dst.fill(0),
        }
        Ok(())
    }

    fn swap_out(&mut self, io: &PageIo<'_>, frame: Ppn) -> VmResult<()> {
        debug_assert!(self.slot.is_none());
        // SAFETY: 驱逐路径持有帧表锁和页面锁
        let src = unsafe { frame_bytes(frame) };
        let slot = io.swap.swap_out(src)?;
        self.slot = Some(slot);
        io.owner.unmap(io.vpn);
        log::trace!("vm: anon {:?} -> {:?}", io.vpn, slot);
        Ok(())
    }

    fn destroy(&mut self, io: &PageIo<'_>, _frame: Option<Ppn>) {
        if let Some(slot) = self.slot.take() {
            io.swap.free(slot);
        }
    }

    fn peek(&self, io: &PageIo<'_>, dst: &mut [u8]) -> VmResult<()> {
        match self.slot {
            Some(slot) => io.swap.read(slot, dst),
            None => {
                dst.fill(0);
                Ok(())
            }
        }
    }
}
