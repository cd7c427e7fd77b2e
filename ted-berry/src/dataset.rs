//! 数据集操作.
//!
//! 提供迭代器风格的 (真值, 重建) 堆栈对加载模式.

use std::path::{Path, PathBuf};

use crate::LabelStack;

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.extend(it);
    Some(ans)
}

/// 一对 (真值, 重建) 标签堆栈.
///
/// 该结构完全透明, 仅包含两个公开的子结构, 用户可以直接使用它们
/// 来实现相关上层功能. 两个堆栈形状是否一致由评估阶段检查.
#[derive(Debug, Clone)]
pub struct StackPair {
    /// 真值标签堆栈.
    pub truth: LabelStack,

    /// 重建标签堆栈.
    pub recon: LabelStack,
}

impl StackPair {
    /// 分别打开 nii 文件格式的真值和重建标签堆栈.
    /// 如果任一文件打开失败, 则返回 `Err`.
    pub fn open(truth_path: impl AsRef<Path>, recon_path: impl AsRef<Path>) -> nifti::Result<Self> {
        let truth = LabelStack::open(truth_path.as_ref())?;
        let recon = LabelStack::open(recon_path.as_ref())?;
        Ok(Self { truth, recon })
    }
}

/// 假设 `path` 是数据集目录.
/// 返回值: (truth path, recon path)
/// 注意: `path/truth` 或 `path/recon` 目录不存在时 panic.
#[inline]
fn make_loader_path<P: AsRef<Path>>(path: P) -> (PathBuf, PathBuf) {
    let mut truth_path = path.as_ref().to_owned();
    let mut recon_path = truth_path.clone();
    truth_path.push("truth");
    assert!(truth_path.is_dir());

    recon_path.push("recon");
    assert!(recon_path.is_dir());

    (truth_path, recon_path)
}

/// 从指定索引和路径创建 (真值, 重建) 堆栈对 ([`StackPair`]) 加载器.
///
/// # 注意
///
/// 1. `dataset_path` 必须是目录, 并且目录下存在 "truth" 和 "recon"
///   目录, 否则程序 panic.
/// 2. `data` 的所有值 `value` 必须在 "truth" 和 "recon" 目录下分别存在
///   形如 `truth-{value}.nii` 和 `recon-{value}.nii` 的文件,
///   否则加载器在迭代时会返回 `Result::Error`.
/// 3. 相同索引对应的真值和重建必须一一对应, 否则程序行为未定义.
pub fn pair_loader<I: IntoIterator<Item = u32>, P: AsRef<Path>>(
    data: I,
    dataset_path: P,
) -> PairLoader {
    let (truth_path, recon_path) = make_loader_path(dataset_path);
    let mut data: Vec<u32> = data.into_iter().collect();
    data.reverse();

    PairLoader {
        truth_path,
        recon_path,
        data_rev: data,
    }
}

/// (真值, 重建) 堆栈对数据加载器.
#[derive(Debug)]
pub struct PairLoader {
    truth_path: PathBuf,
    recon_path: PathBuf,
    data_rev: Vec<u32>,
}

impl Iterator for PairLoader {
    type Item = (u32, nifti::Result<StackPair>);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.data_rev.pop()?;

        self.truth_path.push(format!("truth-{idx}.nii"));
        self.recon_path.push(format!("recon-{idx}.nii"));
        let data = StackPair::open(&self.truth_path, &self.recon_path);
        self.recon_path.pop();
        self.truth_path.pop();

        Some((idx, data))
    }
}

impl ExactSizeIterator for PairLoader {
    #[inline]
    fn len(&self) -> usize {
        self.data_rev.len()
    }
}
