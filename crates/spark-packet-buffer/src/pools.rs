use std::sync::{Arc, OnceLock};

use bytes::BytesMut;
use tracing::error;

use crate::{
    ByteCount, ConfigError, MAX_LARGE_PACKET_BUFFER_SIZE, MAX_PACKET_BUFFER_SIZE, PacketBuffer,
    PacketBufferConfig,
    tier::{PoolTier, Tier, TierStats},
};

static GLOBAL_POOLS: OnceLock<PacketBufferPools> = OnceLock::new();

/// `PacketBufferPools` 聚合标准与大包两个分级，是缓冲获取与归还的唯一入口。
///
/// # 模块角色（Why）
/// - 收发路径通过 [`PacketBufferPools::global`] 共享进程级缓存；
/// - 测试或多实例部署可以显式构造独立的池集合并注入调用方，互不污染统计与缓存。
///
/// # 核心机制（How）
/// - 句柄内部为 `Arc<PoolsInner>`，克隆只增加引用计数，不触发堆分配；
/// - 每个 [`PacketBuffer`] 记录来源池集合与来源分级，归还时回到同一集合的同一分级。
///
/// # 契约说明（What）
/// - **线程安全**：获取与归还可在任意线程并发调用，分级内部自行串行化缓存访问；
/// - **容量绑定**：每个分级的容量在首次获取（或 [`with_config`](Self::with_config)）时绑定一次，
///   之后传入的不同尺寸被忽略；
/// - **致命错误**：归还时容量与来源分级的绑定容量不一致，说明缓冲并非由分级体系构造或容量已被破坏，
///   直接 panic。
#[derive(Clone)]
pub struct PacketBufferPools {
    inner: Arc<PoolsInner>,
}

struct PoolsInner {
    standard: PoolTier,
    large: PoolTier,
}

impl Default for PacketBufferPools {
    fn default() -> Self {
        Self {
            inner: Arc::new(PoolsInner {
                standard: PoolTier::new(Tier::Standard),
                large: PoolTier::new(Tier::Large),
            }),
        }
    }
}

impl PacketBufferPools {
    /// 创建两个分级均未绑定容量的池集合。
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置创建池集合，并立即绑定两个分级的容量。
    pub fn with_config(config: &PacketBufferConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let pools = Self::new();
        pools.inner.standard.bind(config.standard_size);
        pools.inner.large.bind(config.large_size);
        Ok(pools)
    }

    /// 进程级共享的池集合，首次访问时惰性创建。
    pub fn global() -> &'static Self {
        GLOBAL_POOLS.get_or_init(Self::new)
    }

    /// 从标准分级获取缓冲：长度为 0，引用计数为 1。
    pub fn acquire_standard(&self, size: ByteCount) -> PacketBuffer {
        self.acquire(Tier::Standard, size)
    }

    /// 从大包分级获取缓冲：长度为 0，引用计数为 1。
    pub fn acquire_large(&self, size: ByteCount) -> PacketBuffer {
        self.acquire(Tier::Large, size)
    }

    /// 以已绑定容量（未绑定时为 [`MAX_PACKET_BUFFER_SIZE`]）从标准分级获取缓冲。
    pub fn acquire_standard_default(&self) -> PacketBuffer {
        let size = self
            .bound_size(Tier::Standard)
            .unwrap_or(MAX_PACKET_BUFFER_SIZE);
        self.acquire(Tier::Standard, size)
    }

    /// 以已绑定容量（未绑定时为 [`MAX_LARGE_PACKET_BUFFER_SIZE`]）从大包分级获取缓冲。
    pub fn acquire_large_default(&self) -> PacketBuffer {
        let size = self
            .bound_size(Tier::Large)
            .unwrap_or(MAX_LARGE_PACKET_BUFFER_SIZE);
        self.acquire(Tier::Large, size)
    }

    /// 返回分级已绑定的容量。
    pub fn bound_size(&self, tier: Tier) -> Option<ByteCount> {
        self.tier(tier).bound_size()
    }

    /// 返回分级的统计快照。
    pub fn stats(&self, tier: Tier) -> TierStats {
        self.tier(tier).stats()
    }

    fn tier(&self, tier: Tier) -> &PoolTier {
        match tier {
            Tier::Standard => &self.inner.standard,
            Tier::Large => &self.inner.large,
        }
    }

    fn acquire(&self, tier: Tier, size: ByteCount) -> PacketBuffer {
        let data = self.tier(tier).acquire_or_create(size);
        PacketBuffer::new(data, tier, self.clone())
    }

    /// 将字节区归还到来源分级。
    ///
    /// 两个分级绑定相同容量时，仅凭容量无法区分来源，因此以记录的来源分级为准，
    /// 并要求容量与之精确匹配。
    pub(crate) fn put_back(&self, origin: Tier, data: BytesMut) {
        let capacity = data.capacity();
        let target = self.tier(origin);
        if target.accepts(capacity) {
            target.release(data);
            return;
        }
        let bound = target.bound_size();
        error!(
            tier = %origin,
            capacity,
            ?bound,
            "packet buffer returned with a capacity that matches no tier"
        );
        panic!("PacketBuffer 归还时容量不匹配：来源分级 {origin}，容量 {capacity}，绑定容量 {bound:?}");
    }
}

impl core::fmt::Debug for PacketBufferPools {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PacketBufferPools")
            .field("standard", &self.stats(Tier::Standard))
            .field("large", &self.stats(Tier::Large))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_tier_sizes_still_route_by_origin() {
        let config = PacketBufferConfig {
            standard_size: 2048,
            large_size: 2048,
        };
        let pools = PacketBufferPools::with_config(&config).expect("配置合法");

        pools.acquire_large(2048).release();
        assert_eq!(pools.stats(Tier::Large).returned, 1);
        assert_eq!(pools.stats(Tier::Standard).returned, 0);

        pools.acquire_standard(2048).release();
        assert_eq!(pools.stats(Tier::Standard).returned, 1);
        assert_eq!(pools.stats(Tier::Large).returned, 1);
    }

    #[test]
    #[should_panic(expected = "PacketBuffer 归还时容量不匹配")]
    fn foreign_capacity_is_fatal_on_put_back() {
        let pools = PacketBufferPools::new();
        pools.inner.standard.bind(1200);
        let forged = PacketBuffer::new(BytesMut::with_capacity(999), Tier::Standard, pools.clone());
        forged.release();
    }

    #[test]
    #[should_panic(expected = "PacketBuffer 归还时容量不匹配")]
    fn standard_sized_region_cannot_enter_large_tier() {
        let pools = PacketBufferPools::with_config(&PacketBufferConfig::default()).expect("默认配置合法");
        let forged = PacketBuffer::new(
            BytesMut::with_capacity(MAX_PACKET_BUFFER_SIZE),
            Tier::Large,
            pools.clone(),
        );
        forged.release();
    }

    #[test]
    fn with_config_binds_both_tiers_eagerly() {
        let pools = PacketBufferPools::with_config(&PacketBufferConfig {
            standard_size: 1350,
            large_size: 9000,
        })
        .expect("配置合法");
        assert_eq!(pools.bound_size(Tier::Standard), Some(1350));
        assert_eq!(pools.bound_size(Tier::Large), Some(9000));
        assert_eq!(pools.acquire_standard_default().capacity(), 1350);
        assert_eq!(pools.acquire_large(1).capacity(), 9000);
    }

    #[test]
    fn with_config_rejects_invalid_sizes() {
        let invalid = PacketBufferConfig {
            standard_size: 0,
            large_size: 9000,
        };
        assert!(PacketBufferPools::with_config(&invalid).is_err());
    }

    #[test]
    fn default_entry_points_fall_back_to_protocol_constants() {
        let pools = PacketBufferPools::new();
        assert_eq!(pools.acquire_standard_default().capacity(), MAX_PACKET_BUFFER_SIZE);
        assert_eq!(pools.acquire_large_default().capacity(), MAX_LARGE_PACKET_BUFFER_SIZE);
    }

    #[test]
    fn global_pools_are_a_single_instance() {
        let first = PacketBufferPools::global();
        let second = PacketBufferPools::global();
        assert!(Arc::ptr_eq(&first.inner, &second.inner));
    }
}
