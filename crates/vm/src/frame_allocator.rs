//! 物理帧分配器
//!
//! ## 分配策略（位图）
//!
//! 分配器使用位图（bitmap）跟踪用户帧池中每个物理帧的分配状态：
//!
//! - **bitmap**：每个 bit 表示一个物理帧（0=空闲，1=已分配）
//! - **last_alloc_hint**：上次分配位置提示，利用局部性加速查找
//!
//! 分配时从 last_alloc_hint 开始循环查找第一个空闲位；
//! 释放时直接清除对应 bit，O(1) 操作。
//!
//! 分配器本身不清零帧，也不加锁：它归 [`FrameTable`](crate::FrameTable) 所有，
//! 由帧表锁保护。

use alloc::vec::Vec;

use crate::address::{PageNum, Paddr, Ppn, UsizeConvert};

/// 物理帧分配器。
/// 采用位图策略跟踪 `[start, end)` 范围内每个物理帧的分配状态。
#[derive(Debug)]
pub struct FrameAllocator {
    /// 物理帧的起始 Ppn。
    start: Ppn,
    /// 物理帧的结束 Ppn (不包含)。
    end: Ppn,
    /// 位图数据（每个 bit 表示一个帧：0=空闲，1=已分配）。
    bitmap: Vec<u64>,
    /// 总帧数。
    total_frames: usize,
    /// 已分配帧数。
    allocated_count: usize,
    /// 上次分配的位置提示（位图字下标）。
    last_alloc_hint: usize,
}

impl FrameAllocator {
    /// 创建管理 `[start, end)` 页号范围的分配器
    pub fn new(start: Ppn, end: Ppn) -> Self {
        let total_frames = end.as_usize().saturating_sub(start.as_usize());
        let bitmap_u64_count = total_frames.div_ceil(64);
        FrameAllocator {
            start,
            end,
            bitmap: alloc::vec![0u64; bitmap_u64_count],
            total_frames,
            allocated_count: 0,
            last_alloc_hint: 0,
        }
    }

    /// 以物理地址范围创建分配器
    ///
    /// 起始地址向上、结束地址向下取整到页边界。
    pub fn from_addr_range(start_addr: usize, end_addr: usize) -> Self {
        let start = Ppn::from_addr_ceil(Paddr::from_usize(start_addr));
        let end = Ppn::from_addr_floor(Paddr::from_usize(end_addr));
        Self::new(start, end)
    }

    /// 检查帧是否空闲
    #[inline]
    fn is_free(&self, frame_idx: usize) -> bool {
        let word_idx = frame_idx / 64;
        let bit_idx = frame_idx % 64;
        (self.bitmap[word_idx] & (1u64 << bit_idx)) == 0
    }

    /// 标记帧为已分配
    #[inline]
    fn mark_allocated(&mut self, frame_idx: usize) {
        self.bitmap[frame_idx / 64] |= 1u64 << (frame_idx % 64);
    }

    /// 标记帧为空闲
    #[inline]
    fn mark_free(&mut self, frame_idx: usize) {
        self.bitmap[frame_idx / 64] &= !(1u64 << (frame_idx % 64));
    }

    /// 分配一个物理帧；帧池耗尽时返回 `None`
    pub fn alloc(&mut self) -> Option<Ppn> {
        let bitmap_len = self.bitmap.len();
        if bitmap_len == 0 {
            return None;
        }

        // 循环查找：[hint, end) + [0, hint)
        for offset in 0..bitmap_len {
            let idx = (self.last_alloc_hint + offset) % bitmap_len;
            let word = self.bitmap[idx];

            // 快速跳过全满的 u64
            if word == u64::MAX {
                continue;
            }

            let frame_idx = idx * 64 + (!word).trailing_zeros() as usize;
            // 最后一个字的高位可能超出范围
            if frame_idx >= self.total_frames {
                continue;
            }

            self.mark_allocated(frame_idx);
            self.allocated_count += 1;
            self.last_alloc_hint = idx;
            return Some(Ppn::from_usize(self.start.as_usize() + frame_idx));
        }

        None
    }

    /// 回收一个物理帧
    pub fn dealloc(&mut self, ppn: Ppn) {
        debug_assert!(
            ppn >= self.start && ppn < self.end,
            "dealloc: frame out of range"
        );

        let frame_idx = ppn.as_usize() - self.start.as_usize();
        debug_assert!(!self.is_free(frame_idx), "dealloc: double free detected");

        self.mark_free(frame_idx);
        self.allocated_count -= 1;
    }

    /// 帧是否位于此分配器管理的范围内
    pub fn contains(&self, ppn: Ppn) -> bool {
        ppn >= self.start && ppn < self.end
    }

    /// 获取总的物理帧数
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// 获取空闲的帧数
    pub fn free_frames(&self) -> usize {
        self.total_frames - self.allocated_count
    }

    /// 获取帧分配器的当前状态
    /// # 返回值
    /// - 总帧数
    /// - 已分配的帧数
    /// - 空闲的帧数
    pub fn get_stats(&self) -> (usize, usize, usize) {
        (
            self.total_frames,
            self.allocated_count,
            self.free_frames(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_until_exhausted() {
        let mut allocator = FrameAllocator::new(Ppn(0x100), Ppn(0x103));
        let a = allocator.alloc().unwrap();
        let b = allocator.alloc().unwrap();
        let c = allocator.alloc().unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert!(allocator.contains(a) && allocator.contains(c));
        assert_eq!(allocator.alloc(), None);
        assert_eq!(allocator.get_stats(), (3, 3, 0));

        allocator.dealloc(b);
        assert_eq!(allocator.free_frames(), 1);
        assert_eq!(allocator.alloc(), Some(b));
    }

    #[test]
    fn test_range_spans_multiple_words() {
        let mut allocator = FrameAllocator::new(Ppn(0), Ppn(130));
        for _ in 0..130 {
            assert!(allocator.alloc().is_some());
        }
        assert_eq!(allocator.alloc(), None);
        allocator.dealloc(Ppn(129));
        assert_eq!(allocator.alloc(), Some(Ppn(129)));
    }

    #[test]
    fn test_from_addr_range_rounds_inward() {
        let allocator = FrameAllocator::from_addr_range(0x1001, 0x5fff);
        assert_eq!(allocator.total_frames(), 3);
        assert!(!allocator.contains(Ppn(1)));
        assert!(allocator.contains(Ppn(2)));
        assert!(!allocator.contains(Ppn(5)));
    }
}
