use thiserror::Error;

use crate::ByteCount;

/// 字节区访问的可恢复错误。
///
/// # Why
/// - 缓冲容量在构造时即固定，越界写入若静默扩容会破坏“容量即来源分级”的不变量，
///   因此必须把失败显式交还调用方。
///
/// # What
/// - `CapacityExceeded`：请求写入或扩展的字节数超过剩余可写空间。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketBufferError {
    /// 写入超出固定容量。
    #[error("数据包缓冲容量不足：请求 {requested} 字节，剩余 {remaining} 字节")]
    CapacityExceeded {
        requested: ByteCount,
        remaining: ByteCount,
    },
}

/// 配置加载与校验阶段的错误。
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 某个分级容量被配置为 0。
    #[error("`{field}` 不能为 0")]
    ZeroSize { field: &'static str },
    /// 大包分级容量小于标准分级。
    #[error("large_size ({large}) 不能小于 standard_size ({standard})")]
    LargeSmallerThanStandard {
        standard: ByteCount,
        large: ByteCount,
    },
    /// TOML 文本解析失败。
    #[error("解析数据包缓冲配置失败: {source}")]
    Parse {
        #[from]
        source: toml::de::Error,
    },
}
