//! 未初始化页面

use super::{AnonPage, Backing, FilePage, PageKind};
use crate::address::Ppn;
use crate::arch_ops::frame_bytes;
use crate::error::{VmError, VmResult};
use crate::file::LazyLoad;

/// 尚未首次访问的页面
///
/// 记录页面最终的类型和可选的懒加载描述符。没有描述符的匿名页初始化为全零。
#[derive(Debug, Clone)]
pub struct UninitPage {
    kind: PageKind,
    init: Option<LazyLoad>,
}

impl UninitPage {
    pub(crate) fn new(kind: PageKind, init: Option<LazyLoad>) -> Self {
        Self { kind, init }
    }

    /// 初始化后的类型
    pub fn kind(&self) -> PageKind {
        self.kind
    }

    /// 填充 `frame` 并返回具体后端
    pub(crate) fn initialize(self, frame: Ppn) -> VmResult<Backing> {
        // SAFETY: 帧在填充期间处于 pinned 状态，由当前调用者独占
        let dst = unsafe { frame_bytes(frame) };
        match (self.kind, self.init) {
            (PageKind::Anon, None) => {
                dst.fill(0);
                Ok(Backing::Anon(AnonPage::new()))
            }
            (PageKind::Anon, Some(init)) => {
                init.load_into(dst)?;
                Ok(Backing::Anon(AnonPage::new()))
            }
            (PageKind::File, Some(init)) => {
                init.load_into(dst)?;
                Ok(Backing::File(FilePage::new(
                    init.file,
                    init.offset,
                    init.read_bytes,
                )))
            }
            (PageKind::File, None) => Err(VmError::Io),
        }
    }

    pub(crate) fn peek(&self, dst: &mut [u8]) -> VmResult<()> {
        match &self.init {
            Some(init) => init.load_into(dst),
            None => {
                dst.fill(0);
                Ok(())
            }
        }
    }
}
