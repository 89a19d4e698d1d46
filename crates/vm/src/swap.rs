//! 交换槽管理
//!
//! 交换设备被划分为若干页大小的槽位。[`SwapTable`] 用位图记录哪些槽位被占用，
//! 每个被换出的匿名页独占一个槽位，换入或销毁时归还。
//! 设备的存储格式由外部实现 [`SwapDevice`] 决定。

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use sync::SpinMutex;

use crate::config::PAGE_SIZE;
use crate::error::{VmError, VmResult};

/// 交换设备
///
/// 槽位编号从 0 开始，每个槽位恰好容纳一页。
pub trait SwapDevice: Send + Sync {
    /// 设备上的槽位总数
    fn slot_count(&self) -> usize;

    /// 读取一个槽位的内容，`buf` 长度为一页
    fn read_slot(&self, slot: usize, buf: &mut [u8]) -> VmResult<()>;

    /// 写入一个槽位，`buf` 长度为一页
    fn write_slot(&self, slot: usize, buf: &[u8]) -> VmResult<()>;
}

/// 交换槽编号
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwapSlot(pub usize);

impl fmt::Debug for SwapSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SwapSlot({})", self.0)
    }
}

struct SlotBitmap {
    bits: Vec<u64>,
    total: usize,
    used: usize,
}

impl SlotBitmap {
    fn alloc(&mut self) -> Option<usize> {
        for (idx, word) in self.bits.iter_mut().enumerate() {
            if *word == u64::MAX {
                continue;
            }
            let slot = idx * 64 + (!*word).trailing_zeros() as usize;
            if slot >= self.total {
                return None;
            }
            *word |= 1u64 << (slot % 64);
            self.used += 1;
            return Some(slot);
        }
        None
    }

    fn free(&mut self, slot: usize) {
        let mask = 1u64 << (slot % 64);
        debug_assert!(self.bits[slot / 64] & mask != 0, "swap: double free of slot {}", slot);
        self.bits[slot / 64] &= !mask;
        self.used -= 1;
    }
}

/// 交换槽表
pub struct SwapTable {
    device: Option<Arc<dyn SwapDevice>>,
    slots: SpinMutex<SlotBitmap>,
}

impl SwapTable {
    /// 在交换设备上建立槽表
    pub fn new(device: Arc<dyn SwapDevice>) -> Self {
        let total = device.slot_count();
        Self {
            device: Some(device),
            slots: SpinMutex::new(SlotBitmap {
                bits: alloc::vec![0u64; total.div_ceil(64)],
                total,
                used: 0,
            }),
        }
    }

    /// 没有交换设备的槽表；任何换出都会失败
    pub fn empty() -> Self {
        Self {
            device: None,
            slots: SpinMutex::new(SlotBitmap {
                bits: Vec::new(),
                total: 0,
                used: 0,
            }),
        }
    }

    /// 槽位总数
    pub fn capacity(&self) -> usize {
        self.slots.lock().total
    }

    /// 已占用的槽位数
    pub fn in_use(&self) -> usize {
        self.slots.lock().used
    }

    /// 分配一个槽位并写入一页内容
    ///
    /// 没有空闲槽位时返回 [`VmError::SwapFull`]；写入失败时槽位被归还。
    pub fn swap_out(&self, page: &[u8]) -> VmResult<SwapSlot> {
        debug_assert_eq!(page.len(), PAGE_SIZE);
        let device = self.device.as_ref().ok_or(VmError::SwapFull)?;
        let slot = self.slots.lock().alloc().ok_or(VmError::SwapFull)?;
        if let Err(e) = device.write_slot(slot, page) {
            self.slots.lock().free(slot);
            return Err(e);
        }
        Ok(SwapSlot(slot))
    }

    /// 读取槽位内容，不释放槽位
    pub fn read(&self, slot: SwapSlot, buf: &mut [u8]) -> VmResult<()> {
        debug_assert_eq!(buf.len(), PAGE_SIZE);
        let device = self.device.as_ref().ok_or(VmError::Io)?;
        device.read_slot(slot.0, buf)
    }

    /// 归还槽位
    pub fn free(&self, slot: SwapSlot) {
        self.slots.lock().free(slot.0);
    }
}
