#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 对照真值分割 (ground truth) 为三维重建分割 (reconstruction)
//! 打分, 允许不超过给定物理距离阈值的边界偏移.
//!
//! 与逐体素严格比较不同, 本库在容差范围内寻找重建标签的 *最小错误* 重贴法,
//! 并报告匹配标签对之间的 split 与 merge 数量. 求解通过整数线性规划 (ILP)
//! 完成, 结果是全局最优而非启发式近似.
//!
//! 该 crate 目前仅提供 `safe` 接口. 在非期望情况下, 程序会直接 panic,
//! 而不会导致内存错误. As what Rust promises.
//!
//! # 开发计划
//!
//! ### cell 提取 ✅
//!
//! 将 (真值, 重建) 标签体数据划分为 cell: 同一 (gt, rec) 标签对的体素全集.
//!
//! 实现位于 `ted-berry/src/cells.rs`.
//!
//! ### 各向异性精确欧氏距离变换 ✅
//!
//! 三维可分离的 Felzenszwalb-Huttenlocher 平方距离变换,
//! 每个轴带各自的体素间距权重.
//!
//! 实现位于 `ted-berry/src/dist.rs`.
//!
//! ### 容差枚举 ✅
//!
//! 对每个重建标签建立距离场, 判断每个 cell 能否整体改贴该标签.
//!
//! 实现位于 `ted-berry/src/tolerance.rs`.
//!
//! ### ILP 构建与求解 ✅
//!
//! 指示变量 / 匹配变量 / split 与 merge 计数变量的生成, 以及默认的
//! branch-and-bound 精确求解后端.
//!
//! 实现位于 `ted-berry/src/ilp` 与 `ted-berry/src/solve`.
//!
//! ### 结果提取与位置图 ✅
//!
//! 从解向量恢复每个 cell 的标签, 生成修正后的重建体数据,
//! 以及 split/merge/FP/FN 位置图.
//!
//! 实现位于 `ted-berry/src/ted.rs` 和 `ted-berry/src/post_proc.rs`.
//!
//! ### 完善代码文档 ⌛️
//!
//! 给每个 public API 提供文档, 并视情况给 private API 提供文档.

use ordered_float::OrderedFloat;

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 按照 (z, 高, 宽) 排列.
pub type Idx3d = (usize, usize, usize);

/// 标签值. 旧数据源以浮点数存储整数标签, 这里用全序浮点包装,
/// 以便安全地作为映射键.
pub type Label = OrderedFloat<f32>;

/// 三维标签体数据基础结构.
mod data;

pub use data::{CompactLabelSlice, LabelSlice, LabelSliceMut, LabelStack, OwnedLabelSlice};

pub mod consts;

mod cells;

pub use cells::{Cell, CellTable, ExtractError, PossibleMatches};

pub mod dist;

mod tolerance;

pub mod ilp;

pub mod solve;

pub mod ted;

pub use ted::{evaluate, evaluate_with, TedConfig, TedError, TedErrors, TedOutcome};

pub mod post_proc;

pub mod dataset;

pub mod prelude;
