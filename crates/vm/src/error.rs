//! 虚拟内存错误类型
//!
//! 缺页处理、页面分配和后端 I/O 中可能出现的错误。
//! 可通过 [`VmError::to_errno()`] 转换为系统调用错误码。

use core::fmt;

/// 虚拟内存错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    // 缺页分类
    /// 缺页地址位于内核空间
    KernelAddress,
    /// 对已存在页面的权限违例（写只读页等）
    ProtectionViolation,
    /// 地址既不在补充页表中，也不在栈增长范围内
    InvalidAccess,
    /// 虚拟地址未被映射或页面不驻留
    NotMapped,

    // 注册
    /// 该虚拟地址已有页面
    AlreadyMapped,

    // 后端
    /// 交换设备没有空闲槽位
    SwapFull,
    /// 文件或交换设备 I/O 错误
    Io,
    /// 懒加载读取的字节数不足
    ShortRead {
        /// 期望读取的字节数
        expected: usize,
        /// 实际读取的字节数
        actual: usize,
    },

    // 架构
    /// 硬件页表无法建立映射（通常是中间页表分配失败）
    MappingFailed,
}

impl VmError {
    /// 转换为系统调用错误码（负数）
    pub fn to_errno(&self) -> isize {
        match self {
            VmError::Io | VmError::ShortRead { .. } => -5,
            VmError::MappingFailed | VmError::SwapFull => -12,
            VmError::KernelAddress
            | VmError::ProtectionViolation
            | VmError::InvalidAccess
            | VmError::NotMapped => -14,
            VmError::AlreadyMapped => -17,
        }
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::KernelAddress => write!(f, "fault on kernel address"),
            VmError::ProtectionViolation => write!(f, "protection violation"),
            VmError::InvalidAccess => write!(f, "invalid access"),
            VmError::NotMapped => write!(f, "page not mapped"),
            VmError::AlreadyMapped => write!(f, "page already mapped"),
            VmError::SwapFull => write!(f, "swap device full"),
            VmError::Io => write!(f, "backing store I/O error"),
            VmError::ShortRead { expected, actual } => {
                write!(f, "short read: expected {} bytes, got {}", expected, actual)
            }
            VmError::MappingFailed => write!(f, "hardware mapping failed"),
        }
    }
}

/// 虚拟内存操作的结果类型
pub type VmResult<T> = Result<T, VmError>;
