//! 容差编辑距离主入口.
//!
//! 评估流水线: cell 提取 -> 容差枚举 -> ILP 构建 -> 整数求解 ->
//! 结果提取. 整个过程是纯函数式的: 同样的输入与配置得到同样的输出,
//! 评估之间不保留任何状态.

use std::fmt;

use ndarray::Array3;

use crate::cells::{CellTable, ExtractError};
use crate::consts::{DEFAULT_PITCH_NM, DEFAULT_TOLERANCE_NM};
use crate::ilp::TedIlp;
use crate::solve::{BranchBoundSolver, LinearSolver, SolveError};
use crate::{Idx3d, Label, LabelStack};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 评估配置.
#[derive(Debug, Clone)]
pub struct TedConfig {
    /// 允许的最大边界偏移, 以纳米为单位. 越大的容差产生越多的
    /// 改贴可能, 从而报告越少的错误.
    pub tolerance_nm: f64,

    /// 体素间距, 以纳米为单位, 按照 (z, 高, 宽) 排列.
    pub pitch_nm: [f64; 3],

    /// 真值背景标签. 仅影响位置图的生成.
    pub gt_background: Option<f32>,

    /// 重建背景标签. 该标签不受 "标签不得消失" 约束的保护.
    pub rec_background: Option<f32>,
}

impl Default for TedConfig {
    fn default() -> Self {
        Self {
            tolerance_nm: DEFAULT_TOLERANCE_NM,
            pitch_nm: DEFAULT_PITCH_NM,
            gt_background: None,
            rec_background: None,
        }
    }
}

/// 评估得到的错误计数与匹配关系.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TedErrors {
    /// split 总数: 真值区域被多个重建标签覆盖的额外份数.
    pub splits: u64,

    /// merge 总数: 重建区域覆盖多个真值标签的额外份数.
    pub merges: u64,

    /// 最优解中实际成立的 (真值标签, 重建标签) 匹配, 按升序排列.
    pub matches: Vec<(Label, Label)>,
}

impl TedErrors {
    /// split 与 merge 的总数.
    #[inline]
    pub fn total(&self) -> u64 {
        self.splits + self.merges
    }
}

/// 一次评估的完整输出.
#[derive(Debug, Clone)]
pub struct TedOutcome {
    /// 错误计数与匹配关系.
    pub errors: TedErrors,

    /// 修正后的重建: 每个体素改贴为所属 cell 在最优解中选中的标签.
    pub corrected: LabelStack,
}

/// 评估失败的原因.
#[derive(Debug, Clone, PartialEq)]
pub enum TedError {
    /// 真值与重建体数据的形状不一致.
    /// 两个参数分别为真值形状和重建形状, 按照 (z, 高, 宽) 排列.
    SizeMismatch(Idx3d, Idx3d),

    /// 规划不存在可行解. 合法输入不会出现该情况, 仅作保险.
    Infeasible,

    /// 求解后端未能给出最优解.
    Solver(SolveError),
}

impl fmt::Display for TedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch(gt, rec) => {
                write!(f, "真值形状 {gt:?} 与重建形状 {rec:?} 不一致")
            }
            Self::Infeasible => write!(f, "规划不存在可行解"),
            Self::Solver(e) => write!(f, "求解后端失败: {e}"),
        }
    }
}

impl std::error::Error for TedError {}

impl From<ExtractError> for TedError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::SizeMismatch(gt, rec) => Self::SizeMismatch(gt, rec),
        }
    }
}

impl From<SolveError> for TedError {
    fn from(e: SolveError) -> Self {
        match e {
            SolveError::Infeasible => Self::Infeasible,
            other => Self::Solver(other),
        }
    }
}

/// 以默认 branch-and-bound 后端评估 (真值, 重建) 体数据对.
///
/// 返回错误计数与修正后的重建. 无部分结果: 要么两者都产生,
/// 要么返回 `Err`.
pub fn evaluate(
    ground_truth: &LabelStack,
    reconstruction: &LabelStack,
    config: &TedConfig,
) -> Result<TedOutcome, TedError> {
    evaluate_with(
        ground_truth,
        reconstruction,
        config,
        &BranchBoundSolver::default(),
    )
}

/// 以指定求解后端评估 (真值, 重建) 体数据对.
pub fn evaluate_with(
    ground_truth: &LabelStack,
    reconstruction: &LabelStack,
    config: &TedConfig,
    solver: &dyn LinearSolver,
) -> Result<TedOutcome, TedError> {
    let mut table = CellTable::extract(ground_truth, reconstruction)?;

    // 空体数据: 没有变量与约束, 结果平凡.
    if table.is_empty() {
        return Ok(TedOutcome {
            errors: TedErrors::default(),
            corrected: reconstruction.clone(),
        });
    }

    table.enumerate_alternatives(config.pitch_nm, config.tolerance_nm);

    let ilp = TedIlp::build(&table, config.rec_background.map(Label::from));
    let solution = solver.solve(ilp.problem())?;

    let splits = solution.value(ilp.splits_var()).round();
    let merges = solution.value(ilp.merges_var()).round();
    debug_assert!(splits >= 0.0 && merges >= 0.0);

    let matches: Vec<(Label, Label)> = ilp
        .match_vars()
        .filter(|(_, var)| solution.value(*var) > 0.5)
        .map(|(pair, _)| pair)
        .collect();

    // 每个 cell 恰好选中一个标签; 违反意味着构建或求解缺陷, 直接终止.
    let mut corrected_data = Array3::<f32>::zeros(table.shape());
    for (index, cell) in table.cells().iter().enumerate() {
        let mut chosen: Option<Label> = None;
        let mut picked = 0usize;
        for &(var, label) in ilp.indicators_of(index) {
            if solution.value(var) > 0.5 {
                picked += 1;
                chosen = Some(label);
            }
        }
        assert_eq!(picked, 1, "cell 的指示变量必须恰好选中一个");

        let label = chosen.unwrap().into_inner();
        for &pos in cell.locations() {
            corrected_data[pos] = label;
        }
    }

    Ok(TedOutcome {
        errors: TedErrors {
            splits: splits as u64,
            merges: merges as u64,
            matches,
        },
        corrected: LabelStack::from_array_with_header(reconstruction.header(), corrected_data),
    })
}

#[cfg(test)]
mod tests {
    use super::{evaluate, TedConfig, TedError};
    use crate::{Label, LabelStack};
    use ndarray::{Array3, ArrayView3};

    fn stack(data: Array3<f32>) -> LabelStack {
        LabelStack::from_array(data, [1.0, 1.0, 1.0])
    }

    fn config(tolerance_nm: f64) -> TedConfig {
        TedConfig {
            tolerance_nm,
            pitch_nm: [1.0, 1.0, 1.0],
            ..TedConfig::default()
        }
    }

    fn counts(gt: &LabelStack, rec: &LabelStack, tolerance_nm: f64) -> (u64, u64) {
        let outcome = evaluate(gt, rec, &config(tolerance_nm)).unwrap();
        (outcome.errors.splits, outcome.errors.merges)
    }

    fn same_labels(a: ArrayView3<f32>, b: ArrayView3<f32>) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
    }

    /// 完全一致的输入没有任何错误, 修正结果就是重建本身.
    #[test]
    fn test_exact_match() {
        let gt = stack(Array3::from_elem((1, 2, 2), 1.0));
        let rec = stack(Array3::from_elem((1, 2, 2), 1.0));

        let outcome = evaluate(&gt, &rec, &config(0.0)).unwrap();
        assert_eq!(outcome.errors.splits, 0);
        assert_eq!(outcome.errors.merges, 0);
        assert!(same_labels(outcome.corrected.data(), rec.data()));
        assert_eq!(
            outcome.errors.matches,
            [(Label::from(1.0), Label::from(1.0))]
        );
    }

    /// 真值区域被重建一分为二: 恰好一个 split.
    #[test]
    fn test_pure_split() {
        let gt = stack(Array3::from_elem((1, 2, 2), 1.0));
        let rec = stack(
            Array3::from_shape_vec((1, 2, 2), vec![1.0, 2.0, 1.0, 2.0]).unwrap(),
        );

        let (s, m) = counts(&gt, &rec, 0.0);
        assert_eq!((s, m), (1, 0));
    }

    /// 重建把两个真值区域合二为一: 恰好一个 merge.
    #[test]
    fn test_pure_merge() {
        let gt = stack(
            Array3::from_shape_vec((1, 2, 2), vec![1.0, 2.0, 1.0, 2.0]).unwrap(),
        );
        let rec = stack(Array3::from_elem((1, 2, 2), 1.0));

        let (s, m) = counts(&gt, &rec, 0.0);
        assert_eq!((s, m), (0, 1));
    }

    /// 容差内的边界偏移可以被改贴吸收, 修正结果与真值一致.
    #[test]
    fn test_tolerable_boundary_shift() {
        let gt = stack(
            Array3::from_shape_vec((1, 1, 4), vec![1.0, 1.0, 2.0, 2.0]).unwrap(),
        );
        let rec = stack(
            Array3::from_shape_vec((1, 1, 4), vec![1.0, 1.0, 1.0, 2.0]).unwrap(),
        );

        let outcome = evaluate(&gt, &rec, &config(2.0)).unwrap();
        assert_eq!(outcome.errors.splits, 0);
        assert_eq!(outcome.errors.merges, 0);
        assert!(same_labels(outcome.corrected.data(), gt.data()));
    }

    /// 超出容差的边界偏移必须计为错误.
    #[test]
    fn test_intolerable_boundary_shift() {
        let gt = stack(
            Array3::from_shape_vec((1, 1, 4), vec![1.0, 1.0, 2.0, 2.0]).unwrap(),
        );
        let rec = stack(
            Array3::from_shape_vec((1, 1, 4), vec![1.0, 1.0, 1.0, 2.0]).unwrap(),
        );

        let outcome = evaluate(&gt, &rec, &config(0.5)).unwrap();
        assert!(outcome.errors.total() >= 1);
    }

    /// 层间距使零散真值体素无法被吸收: 重建覆盖两个真值标签, 计一个 merge.
    #[test]
    fn test_anisotropic_stray_gt_voxel() {
        let gt = LabelStack::from_array(
            Array3::from_shape_vec((2, 1, 1), vec![1.0, 2.0]).unwrap(),
            [10.0, 1.0, 1.0],
        );
        let rec = LabelStack::from_array(Array3::from_elem((2, 1, 1), 1.0), [10.0, 1.0, 1.0]);

        let cfg = TedConfig {
            tolerance_nm: 5.0,
            pitch_nm: [10.0, 1.0, 1.0],
            ..TedConfig::default()
        };
        let outcome = evaluate(&gt, &rec, &cfg).unwrap();
        assert_eq!(outcome.errors.splits, 0);
        assert_eq!(outcome.errors.merges, 1);
    }

    /// 层间距使零散重建标签无法迁移: 标签不得消失, 计一个 split.
    #[test]
    fn test_anisotropic_stray_rec_voxel() {
        let gt = LabelStack::from_array(Array3::from_elem((2, 1, 1), 1.0), [10.0, 1.0, 1.0]);
        let rec = LabelStack::from_array(
            Array3::from_shape_vec((2, 1, 1), vec![1.0, 2.0]).unwrap(),
            [10.0, 1.0, 1.0],
        );

        let cfg = TedConfig {
            tolerance_nm: 5.0,
            pitch_nm: [10.0, 1.0, 1.0],
            ..TedConfig::default()
        };
        let outcome = evaluate(&gt, &rec, &cfg).unwrap();
        assert_eq!(outcome.errors.splits, 1);
        assert_eq!(outcome.errors.merges, 0);
    }

    /// 即使容差允许迁移, 重建标签也不得整体消失.
    #[test]
    fn test_label_survival() {
        let gt = stack(Array3::from_elem((1, 1, 4), 1.0));
        let rec = stack(
            Array3::from_shape_vec((1, 1, 4), vec![1.0, 1.0, 1.0, 2.0]).unwrap(),
        );

        let (s, m) = counts(&gt, &rec, 2.0);
        assert_eq!((s, m), (1, 0));
    }

    /// 配置重建背景标签后, 背景可以被整体改贴掉.
    #[test]
    fn test_background_may_vanish() {
        let gt = stack(Array3::from_elem((1, 1, 4), 1.0));
        let rec = stack(
            Array3::from_shape_vec((1, 1, 4), vec![1.0, 1.0, 1.0, 2.0]).unwrap(),
        );

        let cfg = TedConfig {
            tolerance_nm: 2.0,
            pitch_nm: [1.0, 1.0, 1.0],
            rec_background: Some(2.0),
            ..TedConfig::default()
        };
        let outcome = evaluate(&gt, &rec, &cfg).unwrap();
        assert_eq!(outcome.errors.total(), 0);
        assert!(same_labels(outcome.corrected.data(), gt.data()));
    }

    /// 提高容差不会增加错误总数.
    #[test]
    fn test_tolerance_monotonicity() {
        let gt = stack(
            Array3::from_shape_vec((1, 1, 6), vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]).unwrap(),
        );
        let rec = stack(
            Array3::from_shape_vec((1, 1, 6), vec![1.0, 1.0, 1.0, 1.0, 1.0, 2.0]).unwrap(),
        );

        let mut last = u64::MAX;
        for tolerance in [0.0, 1.5, 2.5, 100.0] {
            let outcome = evaluate(&gt, &rec, &config(tolerance)).unwrap();
            assert!(outcome.errors.total() <= last);
            last = outcome.errors.total();
        }
    }

    /// 各向同性间距下, 绕 z 轴旋转 90 度不改变错误计数.
    #[test]
    fn test_rotation_symmetry() {
        let gt_data =
            Array3::from_shape_vec((1, 2, 3), vec![1.0, 1.0, 2.0, 1.0, 2.0, 2.0]).unwrap();
        let rec_data =
            Array3::from_shape_vec((1, 2, 3), vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0]).unwrap();

        // (h, w) -> (w, H - 1 - h).
        let rotate = |a: &Array3<f32>| {
            let (z, h, w) = a.dim();
            Array3::from_shape_fn((z, w, h), |(zz, hh, ww)| a[(zz, h - 1 - ww, hh)])
        };

        let before = counts(&stack(gt_data.clone()), &stack(rec_data.clone()), 1.5);
        let after = counts(&stack(rotate(&gt_data)), &stack(rotate(&rec_data)), 1.5);
        assert_eq!(before, after);
    }

    /// 对修正结果重新评估, 错误不会变多.
    #[test]
    fn test_roundtrip() {
        let gt = stack(
            Array3::from_shape_vec((1, 1, 4), vec![1.0, 1.0, 2.0, 2.0]).unwrap(),
        );
        let rec = stack(
            Array3::from_shape_vec((1, 1, 4), vec![1.0, 1.0, 1.0, 2.0]).unwrap(),
        );

        let first = evaluate(&gt, &rec, &config(2.0)).unwrap();
        let second = evaluate(&gt, &first.corrected, &config(2.0)).unwrap();
        assert!(second.errors.total() <= first.errors.total());

        // 零容差下修正结果就是重建本身, 重评结果一致.
        let strict = evaluate(&gt, &rec, &config(0.0)).unwrap();
        assert!(same_labels(strict.corrected.data(), rec.data()));
        let again = evaluate(&gt, &strict.corrected, &config(0.0)).unwrap();
        assert_eq!(again.errors.splits, strict.errors.splits);
        assert_eq!(again.errors.merges, strict.errors.merges);
    }

    /// 匹配列表与修正结果一致: (g, r) 成立当且仅当某个真值为 g
    /// 的体素被修正为 r.
    #[test]
    fn test_matches_agree_with_corrected() {
        let gt = stack(
            Array3::from_shape_vec((1, 1, 6), vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]).unwrap(),
        );
        let rec = stack(
            Array3::from_shape_vec((1, 1, 6), vec![1.0, 1.0, 1.0, 1.0, 3.0, 3.0]).unwrap(),
        );

        let outcome = evaluate(&gt, &rec, &config(0.0)).unwrap();

        let mut realized: Vec<(Label, Label)> = gt
            .data()
            .iter()
            .zip(outcome.corrected.data().iter())
            .map(|(g, r)| (Label::from(*g), Label::from(*r)))
            .collect();
        realized.sort();
        realized.dedup();

        assert_eq!(outcome.errors.matches, realized);
    }

    /// 空体数据: 没有变量与约束, 结果平凡.
    #[test]
    fn test_empty_volume() {
        let gt = stack(Array3::<f32>::zeros((0, 0, 0)));
        let rec = stack(Array3::<f32>::zeros((0, 0, 0)));

        let outcome = evaluate(&gt, &rec, &config(0.0)).unwrap();
        assert_eq!(outcome.errors.total(), 0);
        assert!(outcome.errors.matches.is_empty());
        assert_eq!(outcome.corrected.size(), 0);
    }

    /// 形状不一致必须报告 `SizeMismatch`.
    #[test]
    fn test_size_mismatch() {
        let gt = stack(Array3::<f32>::zeros((1, 2, 2)));
        let rec = stack(Array3::<f32>::zeros((2, 2, 2)));

        let err = evaluate(&gt, &rec, &config(0.0)).unwrap_err();
        assert_eq!(err, TedError::SizeMismatch((1, 2, 2), (2, 2, 2)));
    }
}
