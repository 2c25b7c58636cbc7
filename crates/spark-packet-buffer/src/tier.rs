use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use bytes::BytesMut;
use spin::{Mutex, Once};
use tracing::{debug, trace, warn};

use crate::ByteCount;

/// 缓冲所属的容量分级。
///
/// 分级在缓冲构造时确定且终生不变，归还时据此选择目标缓存。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    /// 承载单个报文的标准分级。
    Standard,
    /// 承载巨帧或批量报文的大包分级。
    Large,
}

impl Tier {
    /// 稳定的指标/日志名称。
    pub const fn as_str(self) -> &'static str {
        match self {
            Tier::Standard => "standard",
            Tier::Large => "large",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个分级的统计快照。
///
/// 计数器仅用于观测，不参与任何决策。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TierStats {
    /// 已绑定的容量；尚未发生首次获取时为 `None`。
    pub bound_size: Option<ByteCount>,
    /// 缓存未命中、新分配的缓冲数量。
    pub allocated: u64,
    /// 从缓存复用的次数。
    pub reused: u64,
    /// 归还到缓存的次数。
    pub returned: u64,
    /// 当前缓存中闲置的缓冲数量。
    pub cached: usize,
}

/// `PoolTier` 是单个容量分级的并发安全缓存。
///
/// # 核心机制（How）
/// - `size`：`spin::Once` 保证容量绑定闭包在并发首次调用下只执行一次，
///   竞争失败者直接观察到胜出者写入的值；
/// - `cache`：`spin::Mutex<Vec<BytesMut>>` 作为自由链表，临界区仅包含一次 push 或 pop；
/// - `metrics`：以 `Relaxed` 原子计数跟踪分配、复用、归还次数。
///
/// # 契约说明（What）
/// - 缓存只保存底层字节区；[`PacketBuffer`](crate::PacketBuffer) 持有池句柄，不能进入缓存；
/// - 缓存无上限、无淘汰，峰值过后闲置缓冲会一直保留到进程结束；
/// - `release` 的调用方必须保证容量等于已绑定容量，路由校验由
///   [`PacketBufferPools`](crate::PacketBufferPools) 在归还前完成。
pub(crate) struct PoolTier {
    tier: Tier,
    size: Once<ByteCount>,
    cache: Mutex<Vec<BytesMut>>,
    metrics: TierMetrics,
}

impl PoolTier {
    pub(crate) const fn new(tier: Tier) -> Self {
        Self {
            tier,
            size: Once::new(),
            cache: Mutex::new(Vec::new()),
            metrics: TierMetrics::new(),
        }
    }

    /// 绑定分级容量并返回最终生效的值。
    ///
    /// 首次调用者写入 `size`；此后传入不同的值会被忽略，仅记录一条告警。
    pub(crate) fn bind(&self, size: ByteCount) -> ByteCount {
        let mut installed = false;
        let bound = *self.size.call_once(|| {
            installed = true;
            size
        });
        if installed {
            debug!(tier = %self.tier, size, "packet buffer tier bound");
        } else if bound != size {
            warn!(
                tier = %self.tier,
                requested = size,
                bound,
                "packet buffer tier already bound, requested size ignored"
            );
        }
        bound
    }

    pub(crate) fn bound_size(&self) -> Option<ByteCount> {
        self.size.get().copied()
    }

    /// 是否接受该容量的字节区回到本分级。
    pub(crate) fn accepts(&self, capacity: ByteCount) -> bool {
        self.bound_size() == Some(capacity)
    }

    /// 取出一个闲置字节区，未命中时按已绑定容量新建。
    ///
    /// 返回的字节区长度为 0，容量等于绑定容量。
    pub(crate) fn acquire_or_create(&self, size: ByteCount) -> BytesMut {
        let capacity = self.bind(size);
        let cached = self.cache.lock().pop();
        match cached {
            Some(mut data) => {
                data.clear();
                self.metrics.reused.fetch_add(1, Ordering::Relaxed);
                data
            }
            None => {
                trace!(tier = %self.tier, capacity, "packet buffer cache miss");
                self.metrics.allocated.fetch_add(1, Ordering::Relaxed);
                BytesMut::with_capacity(capacity)
            }
        }
    }

    /// 将字节区放回缓存。
    pub(crate) fn release(&self, mut data: BytesMut) {
        debug_assert!(self.accepts(data.capacity()));
        data.clear();
        self.cache.lock().push(data);
        self.metrics.returned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stats(&self) -> TierStats {
        TierStats {
            bound_size: self.bound_size(),
            allocated: self.metrics.allocated.load(Ordering::Relaxed),
            reused: self.metrics.reused.load(Ordering::Relaxed),
            returned: self.metrics.returned.load(Ordering::Relaxed),
            cached: self.cache.lock().len(),
        }
    }
}

struct TierMetrics {
    allocated: AtomicU64,
    reused: AtomicU64,
    returned: AtomicU64,
}

impl TierMetrics {
    const fn new() -> Self {
        Self {
            allocated: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            returned: AtomicU64::new(0),
        }
    }
}
