//! cell 提取与配对信息登记.
//!
//! cell 是联合恒定的最小区域: 真值标签为 `g` 且重建标签为 `r`
//! 的全部体素构成一个 cell. 注意 cell 按 (g, r) 标签对合并,
//! 而不按连通分量拆分.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::{Idx3d, Label, LabelStack};

/// 同一 (真值, 重建) 标签对的体素全集.
#[derive(Debug, Clone)]
pub struct Cell {
    gt_label: Label,
    rec_label: Label,
    locations: Vec<Idx3d>,
    alternatives: BTreeSet<Label>,
}

impl Cell {
    #[inline]
    fn new(gt_label: Label, rec_label: Label) -> Self {
        Self {
            gt_label,
            rec_label,
            locations: Vec::new(),
            alternatives: BTreeSet::new(),
        }
    }

    /// 获取真值标签.
    #[inline]
    pub fn gt_label(&self) -> Label {
        self.gt_label
    }

    /// 获取重建标签.
    #[inline]
    pub fn rec_label(&self) -> Label {
        self.rec_label
    }

    /// 获取 cell 包含的体素索引. 至少包含一个元素.
    #[inline]
    pub fn locations(&self) -> &[Idx3d] {
        &self.locations
    }

    /// 获取 cell 的体素个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// cell 是否为空? 提取产生的 cell 恒为非空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// 获取 cell 在容差内可以改贴的重建标签集合, 按升序排列.
    /// 该集合不包含 cell 自己的重建标签.
    #[inline]
    pub fn alternatives(&self) -> &BTreeSet<Label> {
        &self.alternatives
    }

    #[inline]
    fn push(&mut self, pos: Idx3d) {
        self.locations.push(pos);
    }

    #[inline]
    fn add_alternative(&mut self, label: Label) {
        debug_assert_ne!(label, self.rec_label);
        self.alternatives.insert(label);
    }
}

/// 真值标签与重建标签之间的可能匹配, 双向对称维护.
///
/// 初始仅包含输入中实际观察到的标签对; 容差枚举会将
/// "某个 cell 可改贴 `r`" 对应的 (g, r) 对补充进来.
#[derive(Debug, Clone, Default)]
pub struct PossibleMatches {
    by_gt: BTreeMap<Label, BTreeSet<Label>>,
    by_rec: BTreeMap<Label, BTreeSet<Label>>,
}

impl PossibleMatches {
    /// 登记标签对 (g, r).
    fn register(&mut self, gt_label: Label, rec_label: Label) {
        self.by_gt.entry(gt_label).or_default().insert(rec_label);
        self.by_rec.entry(rec_label).or_default().insert(gt_label);
    }

    /// 标签对 (g, r) 是否已被登记?
    #[inline]
    pub fn contains(&self, gt_label: Label, rec_label: Label) -> bool {
        self.by_gt
            .get(&gt_label)
            .is_some_and(|s| s.contains(&rec_label))
    }

    /// 按升序迭代全部真值标签.
    #[inline]
    pub fn gt_labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.by_gt.keys().copied()
    }

    /// 按升序迭代全部重建标签.
    #[inline]
    pub fn rec_labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.by_rec.keys().copied()
    }

    /// 按升序迭代真值标签 `g` 的所有可能重建标签.
    #[inline]
    pub fn of_gt(&self, gt_label: Label) -> impl Iterator<Item = Label> + '_ {
        self.by_gt.get(&gt_label).into_iter().flatten().copied()
    }

    /// 按升序迭代重建标签 `r` 的所有可能真值标签.
    #[inline]
    pub fn of_rec(&self, rec_label: Label) -> impl Iterator<Item = Label> + '_ {
        self.by_rec.get(&rec_label).into_iter().flatten().copied()
    }

    /// 获取真值标签个数.
    #[inline]
    pub fn num_gt_labels(&self) -> usize {
        self.by_gt.len()
    }

    /// 获取重建标签个数.
    #[inline]
    pub fn num_rec_labels(&self) -> usize {
        self.by_rec.len()
    }
}

/// 提取阶段的输入错误.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// 真值与重建体数据的形状不一致.
    /// 两个参数分别为真值形状和重建形状, 按照 (z, 高, 宽) 排列.
    SizeMismatch(Idx3d, Idx3d),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch(gt, rec) => {
                write!(f, "真值形状 {gt:?} 与重建形状 {rec:?} 不一致")
            }
        }
    }
}

impl std::error::Error for ExtractError {}

/// 一次评估中全部 cell 及其索引结构.
///
/// cell 在表内的迭代顺序是固定的: 先按重建标签升序, 同一重建标签内
/// 按真值标签升序. 之后 ILP 变量的分配顺序依赖该性质.
#[derive(Debug, Clone)]
pub struct CellTable {
    shape: Idx3d,
    cells: Vec<Cell>,
    by_rec_gt: BTreeMap<Label, BTreeMap<Label, usize>>,
    matches: PossibleMatches,
}

impl CellTable {
    /// 对 (真值, 重建) 体数据做一次线性扫描, 提取全部 cell
    /// 并登记初始可能匹配.
    ///
    /// 两个体数据的形状必须完全一致, 否则返回
    /// [`ExtractError::SizeMismatch`].
    pub fn extract(ground_truth: &LabelStack, reconstruction: &LabelStack) -> Result<Self, ExtractError> {
        if ground_truth.shape() != reconstruction.shape() {
            return Err(ExtractError::SizeMismatch(
                ground_truth.shape(),
                reconstruction.shape(),
            ));
        }

        let mut ans = Self {
            shape: ground_truth.shape(),
            cells: Vec::new(),
            by_rec_gt: BTreeMap::new(),
            matches: PossibleMatches::default(),
        };

        for ((pos, g), r) in ground_truth
            .data()
            .indexed_iter()
            .zip(reconstruction.data().iter())
        {
            let (g, r) = (Label::from(*g), Label::from(*r));

            let next_index = ans.cells.len();
            let index = *ans
                .by_rec_gt
                .entry(r)
                .or_default()
                .entry(g)
                .or_insert(next_index);
            if index == next_index {
                ans.cells.push(Cell::new(g, r));
            }
            ans.cells[index].push(pos);
            ans.matches.register(g, r);
        }

        Ok(ans)
    }

    /// 获取体数据形状, 按照 (z, 高, 宽) 排列.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.shape
    }

    /// 获取全部 cell. 迭代顺序不保证; 固定顺序请用
    /// [`Self::rec_labels`] 与 [`Self::cells_of_rec`].
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// 获取指定下标的 cell.
    #[inline]
    pub fn cell(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    /// 获取 cell 总数.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// 是否没有任何 cell? 仅当输入体数据为空时成立.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 按升序迭代输入中出现过的全部重建标签.
    #[inline]
    pub fn rec_labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.by_rec_gt.keys().copied()
    }

    /// 按真值标签升序迭代重建标签为 `rec_label` 的全部 cell 下标.
    #[inline]
    pub fn cells_of_rec(&self, rec_label: Label) -> impl Iterator<Item = usize> + '_ {
        self.by_rec_gt
            .get(&rec_label)
            .into_iter()
            .flat_map(|m| m.values().copied())
    }

    /// 获取可能匹配集合.
    #[inline]
    pub fn matches(&self) -> &PossibleMatches {
        &self.matches
    }

    /// 为指定 cell 登记一个容差内可用的替代重建标签,
    /// 同时登记对应的可能匹配.
    pub(crate) fn add_alternative(&mut self, cell_index: usize, rec_label: Label) {
        let gt_label = self.cells[cell_index].gt_label();
        self.cells[cell_index].add_alternative(rec_label);
        self.matches.register(gt_label, rec_label);
    }
}
