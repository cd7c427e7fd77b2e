//! 容差阈值扫描评估实验.
//!
//! 对同一批 (真值, 重建) 堆栈对, 在多个容差阈值下并行运行评估,
//! 汇总 split/merge 计数与运行统计.

mod profile;
mod result;
mod runner;

fn main() {
    runner::run().analyze();
}
