//! 结果位置图: 在修正后的重建上散点标记 split/merge/FP/FN 位置.
//!
//! 这些都是对 (真值, 修正重建, 匹配关系) 的纯标记操作,
//! 不参与错误计数本身.

use std::collections::BTreeMap;

use ndarray::Array3;

use crate::consts::mark;
use crate::ted::TedErrors;
use crate::{Label, LabelStack};

/// 统计每个真值标签在最优匹配中对应的重建标签个数.
fn gt_multiplicity(errors: &TedErrors) -> BTreeMap<Label, usize> {
    let mut ans: BTreeMap<Label, usize> = BTreeMap::new();
    for (gt, _) in &errors.matches {
        *ans.entry(*gt).or_default() += 1;
    }
    ans
}

/// 统计每个重建标签在最优匹配中对应的真值标签个数.
fn rec_multiplicity(errors: &TedErrors) -> BTreeMap<Label, usize> {
    let mut ans: BTreeMap<Label, usize> = BTreeMap::new();
    for (_, rec) in &errors.matches {
        *ans.entry(*rec).or_default() += 1;
    }
    ans
}

/// 标记所有参与 split 的体素.
///
/// 体素被标记 (取其修正后标签值), 当且仅当它的真值标签在最优匹配中
/// 对应多于一个重建标签. 给定 `gt_background` 时, 背景真值区域不参与
/// 标记. 其余体素为 [`mark::NONE`].
///
/// 两个堆栈的形状必须一致, 否则程序 panic.
pub fn split_locations(
    ground_truth: &LabelStack,
    corrected: &LabelStack,
    errors: &TedErrors,
    gt_background: Option<f32>,
) -> LabelStack {
    assert_eq!(ground_truth.shape(), corrected.shape(), "堆栈形状不一致");
    let multiplicity = gt_multiplicity(errors);
    let background = gt_background.map(Label::from);

    let mut data = Array3::<f32>::from_elem(ground_truth.shape(), mark::NONE);
    for ((pos, g), r) in ground_truth
        .data()
        .indexed_iter()
        .zip(corrected.data().iter())
    {
        let g = Label::from(*g);
        if background == Some(g) {
            continue;
        }
        if multiplicity.get(&g).copied().unwrap_or(0) > 1 {
            data[pos] = *r;
        }
    }

    LabelStack::from_array_with_header(corrected.header(), data)
}

/// 标记所有参与 merge 的体素.
///
/// 体素被标记 (取其修正后标签值), 当且仅当它修正后的重建标签在最优
/// 匹配中对应多于一个真值标签. 给定 `rec_background` 时, 修正后为背景
/// 的体素不参与标记. 其余体素为 [`mark::NONE`].
///
/// 两个堆栈的形状必须一致, 否则程序 panic.
pub fn merge_locations(
    ground_truth: &LabelStack,
    corrected: &LabelStack,
    errors: &TedErrors,
    rec_background: Option<f32>,
) -> LabelStack {
    assert_eq!(ground_truth.shape(), corrected.shape(), "堆栈形状不一致");
    let multiplicity = rec_multiplicity(errors);
    let background = rec_background.map(Label::from);

    let mut data = Array3::<f32>::from_elem(corrected.shape(), mark::NONE);
    for (pos, r) in corrected.data().indexed_iter() {
        let r = Label::from(*r);
        if background == Some(r) {
            continue;
        }
        if multiplicity.get(&r).copied().unwrap_or(0) > 1 {
            data[pos] = r.into_inner();
        }
    }

    LabelStack::from_array_with_header(corrected.header(), data)
}

/// 标记所有假阳性体素: 真值为背景而修正后的重建不是背景.
/// 标记值取修正后的标签.
///
/// 两个堆栈的形状必须一致, 否则程序 panic.
pub fn fp_locations(
    ground_truth: &LabelStack,
    corrected: &LabelStack,
    gt_background: f32,
    rec_background: f32,
) -> LabelStack {
    assert_eq!(ground_truth.shape(), corrected.shape(), "堆栈形状不一致");

    let mut data = Array3::<f32>::from_elem(ground_truth.shape(), mark::NONE);
    for ((pos, g), r) in ground_truth
        .data()
        .indexed_iter()
        .zip(corrected.data().iter())
    {
        if g.to_bits() == gt_background.to_bits() && r.to_bits() != rec_background.to_bits() {
            data[pos] = *r;
        }
    }

    LabelStack::from_array_with_header(corrected.header(), data)
}

/// 标记所有假阴性体素: 修正后的重建为背景而真值不是背景.
/// 标记值取真值标签.
///
/// 两个堆栈的形状必须一致, 否则程序 panic.
pub fn fn_locations(
    ground_truth: &LabelStack,
    corrected: &LabelStack,
    gt_background: f32,
    rec_background: f32,
) -> LabelStack {
    assert_eq!(ground_truth.shape(), corrected.shape(), "堆栈形状不一致");

    let mut data = Array3::<f32>::from_elem(ground_truth.shape(), mark::NONE);
    for ((pos, g), r) in ground_truth
        .data()
        .indexed_iter()
        .zip(corrected.data().iter())
    {
        if g.to_bits() != gt_background.to_bits() && r.to_bits() == rec_background.to_bits() {
            data[pos] = *g;
        }
    }

    LabelStack::from_array_with_header(corrected.header(), data)
}

#[cfg(test)]
mod tests {
    use super::{fn_locations, fp_locations, merge_locations, split_locations};
    use crate::consts::mark;
    use crate::ted::{evaluate, TedConfig};
    use crate::LabelStack;
    use ndarray::Array3;

    fn stack(labels: &[f32]) -> LabelStack {
        let n = labels.len();
        LabelStack::from_array(
            Array3::from_shape_vec((1, 1, n), labels.to_vec()).unwrap(),
            [1.0, 1.0, 1.0],
        )
    }

    fn strict() -> TedConfig {
        TedConfig {
            tolerance_nm: 0.0,
            pitch_nm: [1.0, 1.0, 1.0],
            ..TedConfig::default()
        }
    }

    /// split 区域被整体标记, 无关区域保持未标记.
    #[test]
    fn test_split_locations() {
        let gt = stack(&[1.0, 1.0, 1.0, 3.0]);
        let rec = stack(&[1.0, 1.0, 2.0, 3.0]);
        let outcome = evaluate(&gt, &rec, &strict()).unwrap();
        assert_eq!(outcome.errors.splits, 1);

        let marked = split_locations(&gt, &outcome.corrected, &outcome.errors, None);
        // 真值标签 1 被 {1, 2} 覆盖, 三个体素全部标记.
        assert_eq!(marked[(0, 0, 0)], 1.0);
        assert_eq!(marked[(0, 0, 2)], 2.0);
        assert_eq!(marked[(0, 0, 3)], mark::NONE);
    }

    /// merge 区域被整体标记.
    #[test]
    fn test_merge_locations() {
        let gt = stack(&[1.0, 2.0, 3.0, 3.0]);
        let rec = stack(&[1.0, 1.0, 3.0, 3.0]);
        let outcome = evaluate(&gt, &rec, &strict()).unwrap();
        assert_eq!(outcome.errors.merges, 1);

        let marked = merge_locations(&gt, &outcome.corrected, &outcome.errors, None);
        assert_eq!(marked[(0, 0, 0)], 1.0);
        assert_eq!(marked[(0, 0, 1)], 1.0);
        assert_eq!(marked[(0, 0, 2)], mark::NONE);
    }

    /// FP/FN 以背景标签为界互补.
    #[test]
    fn test_fp_fn_locations() {
        let gt = stack(&[0.0, 1.0, 1.0, 0.0]);
        let rec = stack(&[0.0, 1.0, 0.0, 1.0]);
        let outcome = evaluate(&gt, &rec, &strict()).unwrap();

        let fp = fp_locations(&gt, &outcome.corrected, 0.0, 0.0);
        let fnv = fn_locations(&gt, &outcome.corrected, 0.0, 0.0);

        assert_eq!(fp[(0, 0, 3)], 1.0);
        assert!(mark::is_none(fp[(0, 0, 1)]));
        assert!(mark::is_none(fp[(0, 0, 2)]));

        assert_eq!(fnv[(0, 0, 2)], 1.0);
        assert!(mark::is_none(fnv[(0, 0, 1)]));
        assert!(mark::is_none(fnv[(0, 0, 3)]));
    }
}
