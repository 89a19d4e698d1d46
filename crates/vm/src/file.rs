//! 文件后备接口 trait 定义和懒加载描述符

use alloc::sync::Arc;
use core::fmt;

use crate::config::PAGE_SIZE;
use crate::error::VmResult;

/// 可作为页面后备存储的文件
///
/// 读写都是定位读写，不依赖也不修改任何共享的文件位置。
pub trait BackingFile: Send + Sync {
    /// 从 `offset` 读取数据到缓冲区，返回实际读取的字节数
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> VmResult<usize>;

    /// 将缓冲区数据写入 `offset`，返回实际写入的字节数
    fn write_at(&self, offset: usize, buf: &[u8]) -> VmResult<usize>;
}

/// 懒加载描述符
///
/// 描述一页内容的来源：从 `file` 的 `offset` 处读取 `read_bytes` 字节，
/// 页面其余部分清零。
#[derive(Clone)]
pub struct LazyLoad {
    /// 源文件
    pub file: Arc<dyn BackingFile>,
    /// 文件内偏移
    pub offset: usize,
    /// 需要读取的字节数（不超过一页）
    pub read_bytes: usize,
}

impl LazyLoad {
    /// 创建描述符
    pub fn new(file: Arc<dyn BackingFile>, offset: usize, read_bytes: usize) -> Self {
        debug_assert!(read_bytes <= PAGE_SIZE);
        Self {
            file,
            offset,
            read_bytes,
        }
    }

    /// 将内容装入 `dst`（一整页）
    ///
    /// 读取不足 `read_bytes` 字节时返回 [`VmError::ShortRead`](crate::VmError::ShortRead)。
    pub fn load_into(&self, dst: &mut [u8]) -> VmResult<()> {
        read_page(self.file.as_ref(), self.offset, self.read_bytes, dst)
    }
}

impl fmt::Debug for LazyLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyLoad")
            .field("offset", &self.offset)
            .field("read_bytes", &self.read_bytes)
            .finish()
    }
}

/// 从文件读取 `read_bytes` 字节到 `dst` 开头，其余部分清零
pub(crate) fn read_page(
    file: &dyn BackingFile,
    offset: usize,
    read_bytes: usize,
    dst: &mut [u8],
) -> VmResult<()> {
    let actual = file.read_at(offset, &mut dst[..read_bytes])?;
    if actual != read_bytes {
        log::warn!(
            "vm: short read at offset {:#x}: expected {} bytes, got {}",
            offset,
            read_bytes,
            actual
        );
        return Err(crate::VmError::ShortRead {
            expected: read_bytes,
            actual,
        });
    }
    dst[read_bytes..].fill(0);
    Ok(())
}
