//! 容差枚举: 判断每个 cell 可以改贴哪些重建标签.
//!
//! 对每个重建标签 `r` 建立一张平方距离场, 源为当前贴有 `r` 的全部体素.
//! 一个 cell 能整体改贴 `r`, 当且仅当它的 *每个* 体素到 `r` 的距离都在
//! 容差之内; 否则改贴意味着某处边界偏移超过阈值.

use ndarray::Array3;

use crate::cells::CellTable;
use crate::{dist, Label};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

impl CellTable {
    /// 为每个 cell 枚举容差内可用的替代重建标签,
    /// 并同步扩充可能匹配集合.
    ///
    /// `pitch_nm` 按照 (z, 高, 宽) 排列. `tolerance_nm` 为允许的最大
    /// 边界偏移, 两者均以纳米为单位. 距离场存储平方距离,
    /// 因此阈值在比较前先平方.
    ///
    /// 每个重建标签的距离场相互独立; 开启 `rayon` feature 时并行计算,
    /// 替代标签的登记始终串行, 保证结果与串行版本一致.
    pub fn enumerate_alternatives(&mut self, pitch_nm: [f64; 3], tolerance_nm: f64) {
        let threshold_sq = tolerance_nm * tolerance_nm;
        let rec_labels: Vec<Label> = self.rec_labels().collect();

        #[cfg(feature = "rayon")]
        let admissible: Vec<Vec<usize>> = rec_labels
            .clone()
            .into_par_iter()
            .map(|rec| self.admissible_cells(rec, pitch_nm, threshold_sq))
            .collect();

        #[cfg(not(feature = "rayon"))]
        let admissible: Vec<Vec<usize>> = rec_labels
            .iter()
            .map(|rec| self.admissible_cells(*rec, pitch_nm, threshold_sq))
            .collect();

        for (rec, cell_indices) in rec_labels.into_iter().zip(admissible) {
            for index in cell_indices {
                self.add_alternative(index, rec);
            }
        }
    }

    /// 计算可以整体改贴 `rec` 的全部 cell 下标 (不含已贴 `rec` 的 cell).
    fn admissible_cells(&self, rec: Label, pitch_nm: [f64; 3], threshold_sq: f64) -> Vec<usize> {
        let field = self.distance_field(rec, pitch_nm);

        self.cells()
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.rec_label() != rec)
            .filter(|(_, cell)| {
                let max_sq = cell
                    .locations()
                    .iter()
                    .map(|&pos| field[pos] as f64)
                    .fold(0.0, f64::max);
                max_sq < threshold_sq
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// 建立重建标签 `rec` 的平方距离场.
    fn distance_field(&self, rec: Label, pitch_nm: [f64; 3]) -> Array3<f32> {
        let mut mask = Array3::<f32>::zeros(self.shape());
        for index in self.cells_of_rec(rec) {
            for &pos in self.cell(index).locations() {
                mask[pos] = 1.0;
            }
        }
        debug_assert!(mask.iter().any(|v| *v != 0.0));

        dist::squared_edt(&mask, pitch_nm)
    }
}

#[cfg(test)]
mod tests {
    use crate::cells::CellTable;
    use crate::{Label, LabelStack};
    use ndarray::array;

    fn table(gt: &[f32], rec: &[f32]) -> CellTable {
        let n = gt.len();
        let shape = (1, 1, n);
        let gt = LabelStack::from_array(
            ndarray::Array3::from_shape_vec(shape, gt.to_vec()).unwrap(),
            [1.0, 1.0, 1.0],
        );
        let rec = LabelStack::from_array(
            ndarray::Array3::from_shape_vec(shape, rec.to_vec()).unwrap(),
            [1.0, 1.0, 1.0],
        );
        CellTable::extract(&gt, &rec).unwrap()
    }

    fn alternatives_of(table: &CellTable, gt: f32, rec: f32) -> Vec<f32> {
        table
            .cells()
            .iter()
            .find(|c| c.gt_label() == Label::from(gt) && c.rec_label() == Label::from(rec))
            .unwrap()
            .alternatives()
            .iter()
            .map(|l| l.into_inner())
            .collect()
    }

    /// 零容差不允许任何改贴.
    #[test]
    fn test_zero_tolerance() {
        let mut t = table(&[1.0, 1.0], &[1.0, 2.0]);
        t.enumerate_alternatives([1.0, 1.0, 1.0], 0.0);
        assert!(t.cells().iter().all(|c| c.alternatives().is_empty()));
    }

    /// 边界附近的 cell 可改贴邻近标签, 远处的不行.
    #[test]
    fn test_boundary_shift() {
        // 真值边界在 2 处, 重建边界在 3 处.
        let mut t = table(&[1.0, 1.0, 2.0, 2.0], &[1.0, 1.0, 1.0, 2.0]);
        t.enumerate_alternatives([1.0, 1.0, 1.0], 2.0);

        // (gt=2, rec=1) 离标签 2 一步, 可改贴.
        assert_eq!(alternatives_of(&t, 2.0, 1.0), [2.0]);
        // (gt=2, rec=2) 离标签 1 一步, 可改贴.
        assert_eq!(alternatives_of(&t, 2.0, 2.0), [1.0]);
        // (gt=1, rec=1) 最远体素距标签 2 三步, 超出容差.
        assert_eq!(alternatives_of(&t, 1.0, 1.0), Vec::<f32>::new());

        // 新增匹配 (2, 1) 已存在, (2, 2) 已存在, (1, 2) 未新增.
        assert!(!t.matches().contains(Label::from(1.0), Label::from(2.0)));
    }

    /// 容差扩大后, 可能匹配集合被同步扩充.
    #[test]
    fn test_matches_extended() {
        let mut t = table(&[1.0, 1.0, 2.0, 2.0], &[1.0, 1.0, 1.0, 2.0]);
        assert!(!t.matches().contains(Label::from(1.0), Label::from(2.0)));

        t.enumerate_alternatives([1.0, 1.0, 1.0], 10.0);
        assert!(t.matches().contains(Label::from(1.0), Label::from(2.0)));
        assert_eq!(alternatives_of(&t, 1.0, 1.0), [2.0]);
    }

    /// 各向异性间距: z 方向一步即超出容差.
    #[test]
    fn test_anisotropic_pitch() {
        let gt = LabelStack::from_array(
            array![[[1.0_f32]], [[1.0]]],
            [10.0, 1.0, 1.0],
        );
        let rec = LabelStack::from_array(
            array![[[1.0_f32]], [[2.0]]],
            [10.0, 1.0, 1.0],
        );
        let mut t = CellTable::extract(&gt, &rec).unwrap();
        t.enumerate_alternatives([10.0, 1.0, 1.0], 5.0);

        // 5^2 = 25 < 10^2 = 100: 两个 cell 都不能改贴.
        assert!(t.cells().iter().all(|c| c.alternatives().is_empty()));

        let mut t2 = CellTable::extract(&gt, &rec).unwrap();
        t2.enumerate_alternatives([10.0, 1.0, 1.0], 11.0);
        assert!(t2.cells().iter().all(|c| c.alternatives().len() == 1));
    }
}
