//! 文件映射页后端

use alloc::sync::Arc;
use core::fmt;

use super::{Backend, PageIo};
use crate::address::Ppn;
use crate::arch_ops::frame_bytes;
use crate::error::{VmError, VmResult};
use crate::file::{read_page, BackingFile};

/// 文件映射页
///
/// 页面内容对应文件 `offset` 处的 `read_bytes` 字节，余下部分为零。
/// 只有脏页会写回文件。
#[derive(Clone)]
pub struct FilePage {
    file: Arc<dyn BackingFile>,
    offset: usize,
    read_bytes: usize,
}

impl FilePage {
    pub(crate) fn new(file: Arc<dyn BackingFile>, offset: usize, read_bytes: usize) -> Self {
        Self {
            file,
            offset,
            read_bytes,
        }
    }

    fn write_back(&self, frame: Ppn) -> VmResult<()> {
        // SAFETY: 调用者持有页面锁，驻留帧不会被并发修改归属
        let src = unsafe { frame_bytes(frame) };
        let written = self.file.write_at(self.offset, &src[..self.read_bytes])?;
        if written != self.read_bytes {
            return Err(VmError::Io);
        }
        Ok(())
    }
}

impl Backend for FilePage {
    fn swap_in(&mut self, _io: &PageIo<'_>, frame: Ppn) -> VmResult<()> {
        // SAFETY: 帧在填充期间处于 pinned 状态
        let dst = unsafe { frame_bytes(frame) };
        read_page(self.file.as_ref(), self.offset, self.read_bytes, dst)
    }

    fn swap_out(&mut self, io: &PageIo<'_>, frame: Ppn) -> VmResult<()> {
        if io.owner.is_dirty(io.vpn) {
            self.write_back(frame)?;
            io.owner.set_dirty(io.vpn, false);
        }
        io.owner.unmap(io.vpn);
        Ok(())
    }

    fn destroy(&mut self, io: &PageIo<'_>, frame: Option<Ppn>) {
        let Some(frame) = frame else { return };
        if io.owner.is_dirty(io.vpn) {
            if let Err(e) = self.write_back(frame) {
                log::error!("vm: write-back of {:?} failed: {}", io.vpn, e);
            }
            io.owner.set_dirty(io.vpn, false);
        }
    }

    fn peek(&self, _io: &PageIo<'_>, dst: &mut [u8]) -> VmResult<()> {
        read_page(self.file.as_ref(), self.offset, self.read_bytes, dst)
    }
}

impl fmt::Debug for FilePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePage")
            .field("offset", &self.offset)
            .field("read_bytes", &self.read_bytes)
            .finish()
    }
}
