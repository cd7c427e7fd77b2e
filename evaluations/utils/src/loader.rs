//! 对 `ted-berry::dataset` 的更一层封装. 提供更直接的数据集加载器.

use std::env;
use std::path::{Path, PathBuf};
use ted_berry::dataset::{self, PairLoader};

/// 获取 (真值, 重建) 评估数据集基本路径.
///
/// 1. 若环境变量 `$TED_EVAL_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/ted`.
pub fn pair_dir_from_env_or_home() -> PathBuf {
    if let Ok(d) = env::var("TED_EVAL_DIR") {
        PathBuf::from(d)
    } else {
        dataset::home_dataset_dir_with(["ted"]).unwrap()
    }
}

/// 获取评估数据对个数.
///
/// 1. 若环境变量 `$TED_EVAL_PAIRS` 是合法非负整数, 则返回其值;
/// 2. 否则, 返回 4.
pub fn pair_count_from_env() -> u32 {
    env::var("TED_EVAL_PAIRS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(4)
}

/// 获取 `path` 下的 (真值, 重建) 堆栈对加载器, 数据对个数由
/// [`pair_count_from_env`] 给出.
pub fn pairs<P: AsRef<Path>>(path: P) -> PairLoader {
    dataset::pair_loader(0..pair_count_from_env(), path)
}

/// 从 `$TED_EVAL_DIR` 或者 `$HOME/dataset/ted` 下获取堆栈对加载器.
#[inline]
pub fn pairs_from_env_or_home() -> PairLoader {
    pairs(pair_dir_from_env_or_home())
}
