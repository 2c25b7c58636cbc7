use serde::{Deserialize, Serialize};

use crate::{ByteCount, ConfigError, MAX_LARGE_PACKET_BUFFER_SIZE, MAX_PACKET_BUFFER_SIZE};

/// 两个缓冲分级的容量配置。
///
/// # 设计动机（Why）
/// - 惰性绑定沿用“首次调用者决定容量”的语义；当部署方希望在启动阶段一次性确定容量时，
///   通过该配置构造 [`PacketBufferPools`](crate::PacketBufferPools) 可提前绑定两个分级，
///   避免不同调用点传入不一致的尺寸。
///
/// # 契约说明（What）
/// - 缺省字段回落到 [`MAX_PACKET_BUFFER_SIZE`] 与 [`MAX_LARGE_PACKET_BUFFER_SIZE`]；
/// - 两个容量均需非零，且 `large_size >= standard_size`；
/// - 未知字段会被拒绝，防止拼写错误被静默忽略。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PacketBufferConfig {
    /// 标准分级容量。
    pub standard_size: ByteCount,
    /// 大包分级容量。
    pub large_size: ByteCount,
}

impl Default for PacketBufferConfig {
    fn default() -> Self {
        Self {
            standard_size: MAX_PACKET_BUFFER_SIZE,
            large_size: MAX_LARGE_PACKET_BUFFER_SIZE,
        }
    }
}

impl PacketBufferConfig {
    /// 从 TOML 文本解析并校验配置。
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验容量约束。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.standard_size == 0 {
            return Err(ConfigError::ZeroSize {
                field: "standard_size",
            });
        }
        if self.large_size == 0 {
            return Err(ConfigError::ZeroSize { field: "large_size" });
        }
        if self.large_size < self.standard_size {
            return Err(ConfigError::LargeSmallerThanStandard {
                standard: self.standard_size,
                large: self.large_size,
            });
        }
        Ok(())
    }
}
