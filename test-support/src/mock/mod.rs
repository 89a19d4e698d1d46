//! Mock 实现模块
//!
//! 提供架构相关操作和内存管理配置的 Mock 实现，用于宿主机上的单元测试

pub mod arch;
pub mod mm;
