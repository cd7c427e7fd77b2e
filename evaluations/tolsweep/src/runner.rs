//! 程序运行函数.

use crate::profile::SweepProfile;
use crate::result::SweepResult;
use std::path::Path;
use std::thread;
use ted_berry::prelude::*;
use utils::loader;

/// 参与扫描的容差阈值, 以纳米为单位.
pub const THRESHOLDS: [f64; 4] = [0.0, 50.0, 100.0, 200.0];

/// 实际运行.
pub fn run() -> SweepResult {
    let pair_dir = loader::pair_dir_from_env_or_home();
    assert!(pair_dir.is_dir());
    let p = pair_dir.as_path();

    // 短路判断
    assert!(
        loader::pairs(p).next().is_some_and(|(_, r)| r.is_ok()),
        "Loading dataset config error"
    );

    println!("Running tolerance sweep on {} cores...", utils::cpus());
    thread::scope(|s| {
        let handles = THRESHOLDS.map(|t| s.spawn(move || sweep_at(p, t)));

        SweepResult::from_iter(
            THRESHOLDS.into_iter().zip(
                handles
                    .into_iter()
                    .map(|th| th.join().expect("Thread joining error")),
            ),
        )
    })
}

/// 在单个容差阈值下评估全部数据对.
fn sweep_at(dir: &Path, tolerance_nm: f64) -> SweepProfile {
    let mut profile = SweepProfile::new();

    for (_, pair) in loader::pairs(dir) {
        let Ok(pair) = pair else {
            profile.count_failed();
            continue;
        };

        let config = TedConfig {
            tolerance_nm,
            pitch_nm: pair.truth.pitch_nm(),
            ..TedConfig::default()
        };

        profile.eval_start();
        let outcome = match evaluate(&pair.truth, &pair.recon, &config) {
            Ok(outcome) => outcome,
            Err(_) => {
                profile.count_failed();
                continue;
            }
        };
        profile.eval_elapsed();
        profile.count_pair(&outcome.errors);

        let split = post_proc::split_locations(&pair.truth, &outcome.corrected, &outcome.errors, None);
        let merge = post_proc::merge_locations(&pair.truth, &outcome.corrected, &outcome.errors, None);
        profile.count_compact(compact_len(&split) + compact_len(&merge));
    }

    profile.finish()
}

/// 逐切片压缩位置图, 返回压缩后的总字节数.
fn compact_len(stack: &LabelStack) -> u64 {
    stack
        .slice_iter()
        .map(|s| s.to_owned().compress().compressed_len() as u64)
        .sum()
}
