//! `spark-packet-buffer` 为数据包收发热路径提供分级、引用计数的可复用缓冲。
//!
//! # 模块定位（Why）
//! - 报文接收与发送处于每包必经的热路径，逐包向堆申请内存会带来明显抖动；
//!   本 crate 以两个容量分级（标准 / 大包）的缓存复用固定容量的字节区，稳态下不再分配。
//! - 一个物理缓冲可能承载多个合并（coalesced）的协议报文，因此需要显式的引用计数：
//!   只有最后一个逻辑持有者结束使用时，缓冲才回到其来源分级。
//!
//! # 设计概要（How）
//! - [`PacketBuffer`] 持有固定容量的 `BytesMut`、引用计数与来源分级 [`Tier`]；
//!   计数操作需要 `&mut self`，终结操作消耗 `self`，借用规则即“同一时刻仅一个持有者修改计数”的契约。
//! - 每个分级内部使用 `spin::Once` 在首次获取时绑定容量，`spin::Mutex<Vec<BytesMut>>` 作为自由链表。
//! - [`PacketBufferPools`] 聚合两个分级，既可通过 [`PacketBufferPools::global`] 获取进程级单例，
//!   也可显式构造后注入调用方，便于测试隔离。
//!
//! # 契约说明（What）
//! - 引用计数下溢、`release` 时仍有其它持有者、归还时容量与来源分级不符，均视为调用方逻辑错误，
//!   以 panic 立即终止，而非返回可恢复错误。
//! - 字节区越界写入属于输入错误，返回 [`PacketBufferError`]，缓冲绝不会原地扩容。
//!
//! # 使用示例
//! ```
//! use spark_packet_buffer::PacketBufferPools;
//!
//! let pools = PacketBufferPools::new();
//! let mut buffer = pools.acquire_standard(1200);
//! buffer.put_slice(b"coalesced").expect("写入应在容量之内");
//! buffer.split();
//! buffer.decrement();
//! let buffer = buffer.maybe_release().expect("仍有一个持有者");
//! buffer.release();
//! ```

mod config;
mod error;
mod packet_buffer;
mod pools;
mod tier;

pub use config::PacketBufferConfig;
pub use error::{ConfigError, PacketBufferError};
pub use packet_buffer::PacketBuffer;
pub use pools::PacketBufferPools;
pub use tier::{Tier, TierStats};

/// 字节计数，沿用协议层对长度与容量的统一表示。
pub type ByteCount = usize;

/// 标准分级的默认容量，对应单个最大报文的缓冲尺寸。
pub const MAX_PACKET_BUFFER_SIZE: ByteCount = 1452;

/// 大包分级的默认容量，用于 GSO/巨帧等批量收发场景。
pub const MAX_LARGE_PACKET_BUFFER_SIZE: ByteCount = 20 * 1024;

/// 从进程级标准分级获取缓冲。
///
/// `size` 仅在该分级首次被使用时绑定容量，之后的调用沿用首次绑定的值。
pub fn acquire_standard(size: ByteCount) -> PacketBuffer {
    PacketBufferPools::global().acquire_standard(size)
}

/// 从进程级大包分级获取缓冲，容量绑定规则同 [`acquire_standard`]。
pub fn acquire_large(size: ByteCount) -> PacketBuffer {
    PacketBufferPools::global().acquire_large(size)
}
