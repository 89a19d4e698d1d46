//! 测试支持 crate
//!
//! 提供 Mock 实现。各 crate 在 `cfg(test)` 下为这些类型实现自己的 trait，
//! 以避免 test-support 反向依赖被测 crate。

#![no_std]

pub mod mock;
