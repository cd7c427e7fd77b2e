//! 单个容差阈值下的运行统计.

use std::time::{Duration, Instant};
use ted_berry::TedErrors;

/// benchmark 计时器.
///
/// 该计时器支持 "中途中断" 与 "结束中断, 继续开始计时".
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器. 初始化时会视为已经开始计时 (`self.start()`).
    #[inline]
    pub fn new() -> Self {
        Self {
            consumed: Duration::from_secs(0),
            since: Instant::now(),
        }
    }

    /// 开始计时. 可以通过反复调用来重置.
    #[inline]
    pub fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时, 并将这一区间的时间累加. 返回本轮计时时长.
    ///
    /// # 注意
    ///
    /// 上一次调用必须是 `self.start()`, 否则计算时间值无意义.
    #[inline]
    pub fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    /// 获得总共累计下来的时间 (以微秒为单位).
    #[inline]
    pub fn get_total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

impl Default for AccTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// 单个容差阈值下的扫描统计.
#[derive(Clone, Debug)]
pub struct SweepProfile {
    /// 成功评估的数据对个数.
    pairs: u64,

    /// 加载或评估失败的数据对个数.
    failed: u64,

    /// 全部数据对的 split 总数.
    splits: u64,

    /// 全部数据对的 merge 总数.
    merges: u64,

    /// 评估本身花费的总时间.
    eval_time: AccTimer,

    /// 整个任务花费的总时间 (包括 IO 与配置外部环境时间).
    real_time: AccTimer,

    /// 最耗时的一次评估所消耗的时间.
    most: Duration,

    /// split/merge 位置图压缩后的总字节数.
    compact_bytes: u64,
}

impl SweepProfile {
    /// 初始化.
    #[inline]
    pub fn new() -> Self {
        Self {
            pairs: 0,
            failed: 0,
            splits: 0,
            merges: 0,
            eval_time: AccTimer::default(),
            real_time: AccTimer::default(),
            most: Duration::MAX,
            compact_bytes: 0,
        }
    }

    /// 开始一次评估计时.
    #[inline]
    pub fn eval_start(&mut self) {
        self.eval_time.start();
    }

    /// 结束一次评估计时.
    #[inline]
    pub fn eval_elapsed(&mut self) {
        let d = self.eval_time.elapsed();
        self.most = match self.most {
            Duration::MAX => d,
            once_duration => std::cmp::max(d, once_duration),
        };
    }

    /// 记录一对成功评估的数据.
    #[inline]
    pub fn count_pair(&mut self, errors: &TedErrors) {
        self.pairs += 1;
        self.splits += errors.splits;
        self.merges += errors.merges;
    }

    /// 记录一对失败的数据.
    #[inline]
    pub fn count_failed(&mut self) {
        self.failed += 1;
    }

    /// 累加位置图压缩字节数.
    #[inline]
    pub fn count_compact(&mut self, bytes: u64) {
        self.compact_bytes += bytes;
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.real_time.elapsed();
        self
    }

    /// 获得成功评估的数据对个数.
    #[inline]
    pub fn get_pairs(&self) -> u64 {
        self.pairs
    }

    /// 获得失败的数据对个数.
    #[inline]
    pub fn get_failed(&self) -> u64 {
        self.failed
    }

    /// 获得 split 总数.
    #[inline]
    pub fn get_splits(&self) -> u64 {
        self.splits
    }

    /// 获得 merge 总数.
    #[inline]
    pub fn get_merges(&self) -> u64 {
        self.merges
    }

    /// 以微秒为单位获得评估总时间.
    #[inline]
    pub fn get_eval_time_us(&self) -> u64 {
        self.eval_time.get_total_us()
    }

    /// 以微秒为单位获得任务总时间.
    #[inline]
    pub fn get_real_time_us(&self) -> u64 {
        self.real_time.get_total_us()
    }

    /// 获得单对数据的平均评估时间 (微秒).
    #[inline]
    pub fn get_avg_eval_time_us(&self) -> Option<f64> {
        match self.pairs {
            0 => None,
            pairs => Some(self.get_eval_time_us() as f64 / pairs as f64),
        }
    }

    /// 获取最耗时的一次评估所消耗的时间.
    ///
    /// 如果不存在任务, 则返回 `None`.
    pub fn get_most_time_consuming(&self) -> Option<Duration> {
        match self.most {
            Duration::MAX => None,
            d => Some(d),
        }
    }

    /// 获得位置图压缩后的总字节数.
    #[inline]
    pub fn get_compact_bytes(&self) -> u64 {
        self.compact_bytes
    }
}

impl Default for SweepProfile {
    fn default() -> Self {
        Self::new()
    }
}
