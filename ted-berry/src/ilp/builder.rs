//! 由 cell 表构建 "最小化 split + merge" 的整数线性规划.
//!
//! 变量按固定顺序分配, 保证同一输入的变量编号可复现:
//!
//! 1. 指示变量: 重建标签升序, 每个标签内 cell 按真值标签升序;
//!    每个 cell 先默认标签, 再按升序列出替代标签.
//! 2. 匹配变量: 真值标签升序, 每个真值标签内可能重建标签升序.
//! 3. 每个真值标签一个 split 计数变量, 然后是 split 总数变量.
//! 4. 每个重建标签一个 merge 计数变量, 然后是 merge 总数变量.

use std::collections::BTreeMap;

use super::{IlpProblem, LinearConstraint, Relation, VariableType};
use crate::cells::CellTable;
use crate::Label;

/// 构建完成的规划及其变量编号信息.
#[derive(Debug, Clone)]
pub struct TedIlp {
    problem: IlpProblem,
    /// 每个 cell 的 (指示变量, 对应标签) 列表, 默认标签在首位.
    indicators_by_cell: Vec<Vec<(usize, Label)>>,
    /// (真值标签, 重建标签) 到匹配变量的映射.
    match_vars: BTreeMap<(Label, Label), usize>,
    splits_var: usize,
    merges_var: usize,
    num_indicator_vars: usize,
}

impl TedIlp {
    /// 从 cell 表 (容差枚举已完成) 构建完整规划.
    ///
    /// 若给定 `rec_background`, 则该重建标签不受
    /// "标签不得消失" 约束的保护, 可以被整体改贴掉.
    pub fn build(table: &CellTable, rec_background: Option<Label>) -> Self {
        let mut var = 0usize;
        let mut types: Vec<VariableType> = Vec::new();
        let mut constraints: Vec<LinearConstraint> = Vec::new();

        let mut indicators_by_cell: Vec<Vec<(usize, Label)>> = vec![Vec::new(); table.len()];
        let mut indicators_by_rec: BTreeMap<Label, Vec<usize>> = BTreeMap::new();
        let mut indicators_gt_rec: BTreeMap<(Label, Label), Vec<usize>> = BTreeMap::new();

        // 指示变量: 每个 cell 的默认标签与全部替代标签各占一个.
        for rec in table.rec_labels() {
            for index in table.cells_of_rec(rec) {
                let cell = table.cell(index);
                let begin = var;

                for label in std::iter::once(cell.rec_label())
                    .chain(cell.alternatives().iter().copied())
                {
                    indicators_by_cell[index].push((var, label));
                    indicators_by_rec.entry(label).or_default().push(var);
                    indicators_gt_rec
                        .entry((cell.gt_label(), label))
                        .or_default()
                        .push(var);
                    types.push(VariableType::Binary);
                    var += 1;
                }

                // 每个 cell 必须恰好选中一个标签.
                let mut coverage = LinearConstraint::new();
                for v in begin..var {
                    coverage.set_coefficient(v, 1.0);
                }
                coverage.set_relation(Relation::Equal);
                coverage.set_value(1.0);
                constraints.push(coverage);
            }
        }
        let num_indicator_vars = var;

        // 标签不得消失: 每个输入重建标签至少保留在一个 cell 上.
        // 替代标签的指示变量也计入该和, 标签可以迁移但不能消失.
        for rec in table.rec_labels() {
            if rec_background == Some(rec) {
                continue;
            }
            let mut survival = LinearConstraint::new();
            for &v in &indicators_by_rec[&rec] {
                survival.set_coefficient(v, 1.0);
            }
            survival.set_relation(Relation::GreaterEqual);
            survival.set_value(1.0);
            constraints.push(survival);
        }

        // 匹配变量.
        let mut match_vars: BTreeMap<(Label, Label), usize> = BTreeMap::new();
        for gt in table.matches().gt_labels() {
            for rec in table.matches().of_gt(gt) {
                match_vars.insert((gt, rec), var);
                types.push(VariableType::Binary);
                var += 1;
            }
        }

        // cell 的标签选择激活对应匹配.
        for gt in table.matches().gt_labels() {
            for rec in table.matches().of_gt(gt) {
                let match_var = match_vars[&(gt, rec)];
                let contributors = &indicators_gt_rec[&(gt, rec)];
                debug_assert!(!contributors.is_empty());

                // 没有任何 (gt -> rec) 的选择时, 匹配为零.
                let mut no_match = LinearConstraint::new();

                for &v in contributors {
                    no_match.set_coefficient(v, 1.0);

                    // 只要有一个 (gt -> rec) 的选择, 匹配就为一.
                    let mut activation = LinearConstraint::new();
                    activation.set_coefficient(match_var, 1.0);
                    activation.set_coefficient(v, -1.0);
                    activation.set_relation(Relation::GreaterEqual);
                    activation.set_value(0.0);
                    constraints.push(activation);
                }

                no_match.set_coefficient(match_var, -1.0);
                no_match.set_relation(Relation::GreaterEqual);
                no_match.set_value(0.0);
                constraints.push(no_match);
            }
        }

        // 每个真值标签的 split 计数: s = (匹配数) - 1.
        let split_begin = var;
        for gt in table.matches().gt_labels() {
            let split_var = var;
            types.push(VariableType::Integer);
            var += 1;

            let mut positive = LinearConstraint::new();
            positive.set_coefficient(split_var, 1.0);
            positive.set_relation(Relation::GreaterEqual);
            positive.set_value(0.0);
            constraints.push(positive);

            let mut num_splits = LinearConstraint::new();
            num_splits.set_coefficient(split_var, 1.0);
            for rec in table.matches().of_gt(gt) {
                num_splits.set_coefficient(match_vars[&(gt, rec)], -1.0);
            }
            num_splits.set_relation(Relation::Equal);
            num_splits.set_value(-1.0);
            constraints.push(num_splits);
        }
        let split_end = var;

        // split 总数.
        let splits_var = var;
        types.push(VariableType::Integer);
        var += 1;

        let mut sum_of_splits = LinearConstraint::new();
        sum_of_splits.set_coefficient(splits_var, 1.0);
        for v in split_begin..split_end {
            sum_of_splits.set_coefficient(v, -1.0);
        }
        sum_of_splits.set_relation(Relation::Equal);
        sum_of_splits.set_value(0.0);
        constraints.push(sum_of_splits);

        // 每个重建标签的 merge 计数: m = (匹配数) - 1.
        let merge_begin = var;
        for rec in table.matches().rec_labels() {
            let merge_var = var;
            types.push(VariableType::Integer);
            var += 1;

            let mut positive = LinearConstraint::new();
            positive.set_coefficient(merge_var, 1.0);
            positive.set_relation(Relation::GreaterEqual);
            positive.set_value(0.0);
            constraints.push(positive);

            let mut num_merges = LinearConstraint::new();
            num_merges.set_coefficient(merge_var, 1.0);
            for gt in table.matches().of_rec(rec) {
                num_merges.set_coefficient(match_vars[&(gt, rec)], -1.0);
            }
            // 背景标签可以整体消失, 匹配数可能为零;
            // 此时计数由目标压到 max(0, 匹配数 - 1).
            if rec_background == Some(rec) {
                num_merges.set_relation(Relation::GreaterEqual);
            } else {
                num_merges.set_relation(Relation::Equal);
            }
            num_merges.set_value(-1.0);
            constraints.push(num_merges);
        }
        let merge_end = var;

        // merge 总数.
        let merges_var = var;
        types.push(VariableType::Integer);
        var += 1;

        let mut sum_of_merges = LinearConstraint::new();
        sum_of_merges.set_coefficient(merges_var, 1.0);
        for v in merge_begin..merge_end {
            sum_of_merges.set_coefficient(v, -1.0);
        }
        sum_of_merges.set_relation(Relation::Equal);
        sum_of_merges.set_value(0.0);
        constraints.push(sum_of_merges);

        // 组装问题: 最小化 split 总数 + merge 总数.
        let mut problem = IlpProblem::new(var, VariableType::Continuous);
        for (v, ty) in types.into_iter().enumerate() {
            problem.set_variable_type(v, ty);
        }
        for c in constraints {
            problem.add(c);
        }
        problem.objective_mut().set_coefficient(splits_var, 1.0);
        problem.objective_mut().set_coefficient(merges_var, 1.0);

        Self {
            problem,
            indicators_by_cell,
            match_vars,
            splits_var,
            merges_var,
            num_indicator_vars,
        }
    }

    /// 获取构建出的规划.
    #[inline]
    pub fn problem(&self) -> &IlpProblem {
        &self.problem
    }

    /// 获取 cell `index` 的全部 (指示变量, 标签) 对, 默认标签在首位.
    #[inline]
    pub fn indicators_of(&self, index: usize) -> &[(usize, Label)] {
        &self.indicators_by_cell[index]
    }

    /// 按 (真值, 重建) 标签升序迭代全部匹配变量.
    #[inline]
    pub fn match_vars(&self) -> impl Iterator<Item = ((Label, Label), usize)> + '_ {
        self.match_vars.iter().map(|(k, v)| (*k, *v))
    }

    /// split 总数变量的编号.
    #[inline]
    pub fn splits_var(&self) -> usize {
        self.splits_var
    }

    /// merge 总数变量的编号.
    #[inline]
    pub fn merges_var(&self) -> usize {
        self.merges_var
    }

    /// 指示变量的个数. 指示变量恒占据编号区间的前缀.
    #[inline]
    pub fn num_indicator_vars(&self) -> usize {
        self.num_indicator_vars
    }
}

#[cfg(test)]
mod tests {
    use super::TedIlp;
    use crate::cells::CellTable;
    use crate::ilp::VariableType;
    use crate::{Label, LabelStack};
    use ndarray::array;

    fn simple_table() -> CellTable {
        // cell: (gt=1, rec=1), (gt=1, rec=2).
        let gt = LabelStack::from_array(array![[[1.0_f32, 1.0]]], [1.0, 1.0, 1.0]);
        let rec = LabelStack::from_array(array![[[1.0_f32, 2.0]]], [1.0, 1.0, 1.0]);
        CellTable::extract(&gt, &rec).unwrap()
    }

    /// 变量按固定顺序分配: 指示, 匹配, split, S, merge, M.
    #[test]
    fn test_variable_layout() {
        let ilp = TedIlp::build(&simple_table(), None);

        // 两个 cell, 无替代标签: 指示变量 0, 1.
        assert_eq!(ilp.num_indicator_vars(), 2);
        assert_eq!(ilp.indicators_of(0).len(), 1);
        assert_eq!(ilp.indicators_of(1).len(), 1);

        // 匹配变量 (1,1) -> 2, (1,2) -> 3.
        let m: Vec<usize> = ilp.match_vars().map(|(_, v)| v).collect();
        assert_eq!(m, [2, 3]);

        // split: 4 (gt=1), S: 5; merge: 6, 7, M: 8.
        assert_eq!(ilp.splits_var(), 5);
        assert_eq!(ilp.merges_var(), 8);
        assert_eq!(ilp.problem().num_variables(), 9);

        assert_eq!(ilp.problem().variable_type(0), VariableType::Binary);
        assert_eq!(ilp.problem().variable_type(3), VariableType::Binary);
        assert_eq!(ilp.problem().variable_type(5), VariableType::Integer);
        assert_eq!(ilp.problem().variable_type(8), VariableType::Integer);
    }

    /// 替代标签为每个 cell 增加指示变量.
    #[test]
    fn test_alternatives_add_indicators(){
        let mut table = simple_table();
        table.enumerate_alternatives([1.0, 1.0, 1.0], 2.0);
        let ilp = TedIlp::build(&table, None);

        // 每个 cell 一个默认 + 一个替代.
        assert_eq!(ilp.num_indicator_vars(), 4);
        assert_eq!(ilp.indicators_of(0).len(), 2);
        // 默认标签在首位.
        assert_eq!(ilp.indicators_of(0)[0].1, Label::from(1.0));
        assert_eq!(ilp.indicators_of(1)[0].1, Label::from(2.0));
    }

    /// 背景标签不受 "标签不得消失" 约束保护.
    #[test]
    fn test_background_exempt() {
        let table = simple_table();
        let with = TedIlp::build(&table, None);
        let without = TedIlp::build(&table, Some(Label::from(2.0)));

        assert_eq!(
            with.problem().constraints().len(),
            without.problem().constraints().len() + 1
        );
    }
}
