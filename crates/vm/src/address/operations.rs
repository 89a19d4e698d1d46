//! 地址与页号的通用操作

use crate::config::PAGE_SIZE;

/// 与 usize 互相转换的 Trait
pub trait UsizeConvert: Copy {
    /// 转换为 usize
    fn as_usize(&self) -> usize;
    /// 从 usize 构造
    fn from_usize(value: usize) -> Self;
}

/// 按页对齐的操作，为所有实现了 [`UsizeConvert`] 的地址类型自动提供
pub trait AlignOps: UsizeConvert {
    /// 向下对齐到页边界
    fn align_down_to_page(self) -> Self {
        Self::from_usize(self.as_usize() & !(PAGE_SIZE - 1))
    }

    /// 向上对齐到页边界
    fn align_up_to_page(self) -> Self {
        Self::from_usize((self.as_usize() + PAGE_SIZE - 1) & !(PAGE_SIZE - 1))
    }

    /// 地址在页内的偏移
    fn page_offset(self) -> usize {
        self.as_usize() & (PAGE_SIZE - 1)
    }

    /// 是否页对齐
    fn is_page_aligned(self) -> bool {
        self.page_offset() == 0
    }
}

/// `impl_usize_convert!` 宏
///
/// 为 `struct X(pub usize)` 形式的新类型实现 [`UsizeConvert`]。
#[macro_export]
macro_rules! impl_usize_convert {
    ($type:ty) => {
        impl $crate::address::operations::UsizeConvert for $type {
            fn as_usize(&self) -> usize {
                self.0
            }

            fn from_usize(value: usize) -> Self {
                Self(value)
            }
        }
    };
}
