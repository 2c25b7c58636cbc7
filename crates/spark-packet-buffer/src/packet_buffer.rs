use core::fmt;

use bytes::BytesMut;
use tracing::error;

use crate::{ByteCount, PacketBufferError, PacketBufferPools, Tier};

/// `PacketBuffer` 是可复用的固定容量字节区，附带引用计数与来源分级。
///
/// # 设计动机（Why）
/// - 一次 `recv` 读到的数据报可能包含多个合并的协议报文，它们共享同一块物理内存；
///   引用计数记录“还有多少个逻辑报文依赖这块内存”，只有计数归零时才允许回收。
/// - 回收必须回到来源分级，否则分级缓存会混入容量不符的字节区。
///
/// # 生命周期（How）
/// - 获取后计数为 1、长度为 0；
/// - 每从同一缓冲拆出一个额外的逻辑报文，调用一次 [`split`](Self::split)；
/// - 不确定自己是否最后一个持有者的路径：[`decrement`](Self::decrement) 后调用
///   [`maybe_release`](Self::maybe_release)；
/// - 确定自己是最后一个持有者的路径：直接 [`release`](Self::release)，
///   若仍有其它持有者则立即 panic，尽早暴露重复释放或漏调 `split` 的缺陷。
///
/// # 契约说明（What）
/// - **单一修改者**：计数本身不做同步；修改计数需要 `&mut self`，
///   因此同一时刻只有当前持有者能修改，其它逻辑报文只能通过 `&self` 读取字节区；
/// - **容量不变**：容量在构造时确定，任何写入都不会触发扩容，越界写入返回
///   [`PacketBufferError::CapacityExceeded`]；
/// - **终结操作**：`maybe_release` 与 `release` 消耗 `self`，归还后的缓冲无法再被访问；
/// - 直接丢弃而未归还的缓冲只会释放内存，不会回到缓存。
pub struct PacketBuffer {
    data: BytesMut,
    ref_count: usize,
    tier: Tier,
    pools: PacketBufferPools,
}

impl PacketBuffer {
    pub(crate) fn new(data: BytesMut, tier: Tier, pools: PacketBufferPools) -> Self {
        Self {
            data,
            ref_count: 1,
            tier,
            pools,
        }
    }

    /// 增加一个逻辑持有者。
    ///
    /// 当本缓冲即将承载额外的逻辑报文（例如拆分合并数据报）时调用。
    pub fn split(&mut self) {
        self.ref_count += 1;
    }

    /// 减少一个逻辑持有者，但不归还缓冲，即使计数归零。
    ///
    /// # Panics
    /// 计数已为 0 时调用会 panic，表明存在重复释放或遗漏的 `split`。
    pub fn decrement(&mut self) {
        if self.ref_count == 0 {
            error!(tier = %self.tier, "packet buffer reference count would become negative");
            panic!("PacketBuffer 引用计数为负");
        }
        self.ref_count -= 1;
    }

    /// 计数为 0 时归还缓冲并返回 `None`；否则原样交还给调用方。
    #[must_use = "仍有持有者时缓冲会被交还，丢弃返回值将导致缓冲无法回到缓存"]
    pub fn maybe_release(self) -> Option<Self> {
        if self.ref_count == 0 {
            self.put_back();
            None
        } else {
            Some(self)
        }
    }

    /// 作为最后一个持有者释放缓冲并归还到来源分级。
    ///
    /// # Panics
    /// - 计数已为 0（重复释放）；
    /// - 释放后计数仍不为 0（还有其它持有者）。
    pub fn release(mut self) {
        self.decrement();
        if self.ref_count != 0 {
            error!(
                tier = %self.tier,
                ref_count = self.ref_count,
                "packet buffer released while other references are outstanding"
            );
            panic!("PacketBuffer 释放时引用计数不为零: {}", self.ref_count);
        }
        self.put_back();
    }

    fn put_back(self) {
        let Self {
            data, tier, pools, ..
        } = self;
        pools.put_back(tier, data);
    }

    /// 当前逻辑持有者数量。
    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    /// 来源分级。
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// 有效字节长度。
    pub fn len(&self) -> ByteCount {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 固定的底层容量。
    pub fn capacity(&self) -> ByteCount {
        self.data.capacity()
    }

    /// 剩余可写字节数。
    pub fn remaining_mut(&self) -> ByteCount {
        self.capacity() - self.len()
    }

    /// 有效字节区 `[0, len)`。
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 可变的有效字节区 `[0, len)`。
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// 在末尾追加字节，超出剩余容量时拒绝写入。
    pub fn put_slice(&mut self, src: &[u8]) -> Result<(), PacketBufferError> {
        let remaining = self.remaining_mut();
        if src.len() > remaining {
            return Err(PacketBufferError::CapacityExceeded {
                requested: src.len(),
                remaining,
            });
        }
        self.data.extend_from_slice(src);
        Ok(())
    }

    /// 将有效长度调整为 `new_len`，扩展部分以 0 填充。
    ///
    /// 接收路径通常先 `resize(capacity())` 交出整块空间，读取后再 [`truncate`](Self::truncate)
    /// 到实际长度。
    pub fn resize(&mut self, new_len: ByteCount) -> Result<(), PacketBufferError> {
        if new_len > self.capacity() {
            return Err(PacketBufferError::CapacityExceeded {
                requested: new_len - self.len(),
                remaining: self.remaining_mut(),
            });
        }
        self.data.resize(new_len, 0);
        Ok(())
    }

    /// 截断到 `len`；`len` 不小于当前长度时无效果。
    pub fn truncate(&mut self, len: ByteCount) {
        self.data.truncate(len);
    }

    /// 清空内容，容量保持不变。
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl AsRef<[u8]> for PacketBuffer {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

impl AsMut<[u8]> for PacketBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        self.data_mut()
    }
}

impl fmt::Debug for PacketBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketBuffer")
            .field("tier", &self.tier)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("ref_count", &self.ref_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_never_grow_the_backing_region() {
        let pools = PacketBufferPools::new();
        let mut buffer = pools.acquire_standard(8);
        buffer.put_slice(b"12345").expect("容量之内的写入应成功");
        assert_eq!(
            buffer.put_slice(b"6789"),
            Err(PacketBufferError::CapacityExceeded {
                requested: 4,
                remaining: 3
            })
        );
        assert_eq!(buffer.data(), b"12345");
        assert_eq!(buffer.capacity(), 8);
        buffer.release();
    }

    #[test]
    fn resize_and_truncate_model_the_receive_path() {
        let pools = PacketBufferPools::new();
        let mut buffer = pools.acquire_standard(16);
        buffer.resize(buffer.capacity()).expect("扩展到容量上限应成功");
        assert_eq!(buffer.len(), 16);
        buffer.data_mut()[..3].copy_from_slice(b"abc");
        buffer.truncate(3);
        assert_eq!(buffer.as_ref(), b"abc");
        assert!(buffer.resize(17).is_err());
        assert_eq!(buffer.capacity(), 16);
        buffer.clear();
        assert!(buffer.is_empty());
        buffer.release();
    }

    #[test]
    fn split_and_decrement_track_logical_owners() {
        let pools = PacketBufferPools::new();
        let mut buffer = pools.acquire_large(64);
        assert_eq!(buffer.ref_count(), 1);
        buffer.split();
        buffer.split();
        assert_eq!(buffer.ref_count(), 3);
        buffer.decrement();
        assert_eq!(buffer.ref_count(), 2);
        assert_eq!(buffer.tier(), Tier::Large);
        let mut buffer = buffer.maybe_release().expect("计数非零时应交还缓冲");
        buffer.decrement();
        buffer.release();
        assert_eq!(pools.stats(Tier::Large).cached, 1);
    }

    #[test]
    fn debug_output_reports_lifecycle_fields() {
        let pools = PacketBufferPools::new();
        let buffer = pools.acquire_standard(32);
        let rendered = format!("{buffer:?}");
        assert!(rendered.contains("Standard"));
        assert!(rendered.contains("capacity: 32"));
        assert!(rendered.contains("ref_count: 1"));
        buffer.release();
    }
}
