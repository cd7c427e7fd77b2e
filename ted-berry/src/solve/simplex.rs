//! 稠密 Big-M 单纯形法, 求解带变量上下界的线性松弛.

use ndarray::Array2;

use super::SolveError;
use crate::ilp::{IlpProblem, Relation, Sense};

/// 进基判定与主元正性的数值容差.
const TOL: f64 = 1e-9;

/// 人工变量残留的可行性容差.
const FEAS_TOL: f64 = 1e-6;

/// 线性松弛的解.
#[derive(Debug, Clone)]
pub(crate) struct LpSolution {
    /// 结构变量取值, 长度与问题变量数一致.
    pub x: Vec<f64>,

    /// 原始优化方向下的目标值.
    pub objective: f64,
}

/// 在给定的变量上下界内求解 `problem` 的线性松弛.
///
/// 变量的整数性在这里被忽略; 下界必须有限, 上界允许为正无穷.
pub(crate) fn solve_relaxation(
    problem: &IlpProblem,
    lower: &[f64],
    upper: &[f64],
    max_pivots: usize,
) -> Result<LpSolution, SolveError> {
    let n = problem.num_variables();
    debug_assert_eq!(lower.len(), n);
    debug_assert_eq!(upper.len(), n);
    debug_assert!(lower.iter().all(|l| l.is_finite()));

    for j in 0..n {
        if upper[j] < lower[j] - TOL {
            return Err(SolveError::Infeasible);
        }
    }

    // 统一成最小化; 目标值最后按原方向回算.
    let maximize = problem.objective().sense() == Sense::Maximize;
    let c: Vec<f64> = (0..n)
        .map(|j| {
            let v = problem.objective().coefficient(j);
            if maximize {
                -v
            } else {
                v
            }
        })
        .collect();

    // 变量替换 y = x - lower, y >= 0; 约束右端随之平移,
    // 有限上界转成单独的行.
    let mut rows: Vec<(Vec<f64>, Relation, f64)> = Vec::new();
    for con in problem.constraints() {
        let mut a = vec![0.0; n];
        let mut shift = 0.0;
        for (j, coef) in con.coefficients() {
            a[j] = coef;
            shift += coef * lower[j];
        }
        rows.push((a, con.relation(), con.value() - shift));
    }
    for j in 0..n {
        if upper[j].is_finite() {
            let mut a = vec![0.0; n];
            a[j] = 1.0;
            rows.push((a, Relation::LessEqual, upper[j] - lower[j]));
        }
    }

    // 右端非负规范化.
    for (a, rel, b) in rows.iter_mut() {
        if *b < 0.0 {
            for v in a.iter_mut() {
                *v = -*v;
            }
            *b = -*b;
            *rel = match rel {
                Relation::LessEqual => Relation::GreaterEqual,
                Relation::GreaterEqual => Relation::LessEqual,
                Relation::Equal => Relation::Equal,
            };
        }
    }

    let m = rows.len();
    let num_slack = rows
        .iter()
        .filter(|(_, rel, _)| *rel != Relation::Equal)
        .count();
    let num_artificial = rows
        .iter()
        .filter(|(_, rel, _)| *rel != Relation::LessEqual)
        .count();
    let ncols = n + num_slack + num_artificial;
    let art_begin = n + num_slack;

    // 末列是右端, 末行是既约费用.
    let mut t = Array2::<f64>::zeros((m + 1, ncols + 1));
    let mut basis = vec![0usize; m];
    let mut slack_col = n;
    let mut art_col = art_begin;

    for (i, (a, rel, b)) in rows.iter().enumerate() {
        for (j, &coef) in a.iter().enumerate() {
            t[[i, j]] = coef;
        }
        t[[i, ncols]] = *b;

        match rel {
            Relation::LessEqual => {
                t[[i, slack_col]] = 1.0;
                basis[i] = slack_col;
                slack_col += 1;
            }
            Relation::GreaterEqual => {
                t[[i, slack_col]] = -1.0;
                slack_col += 1;
                t[[i, art_col]] = 1.0;
                basis[i] = art_col;
                art_col += 1;
            }
            Relation::Equal => {
                t[[i, art_col]] = 1.0;
                basis[i] = art_col;
                art_col += 1;
            }
        }
    }
    debug_assert_eq!(slack_col, art_begin);
    debug_assert_eq!(art_col, ncols);

    // 既约费用行: 结构变量费用 c, 人工变量费用 Big-M,
    // 再对初始基做价格消去.
    let c_max = c.iter().fold(1.0f64, |acc, v| acc.max(v.abs()));
    let big_m = 1e7 * c_max;

    for (j, &coef) in c.iter().enumerate() {
        t[[m, j]] = coef;
    }
    for j in art_begin..ncols {
        t[[m, j]] = big_m;
    }
    for i in 0..m {
        let cb = t[[m, basis[i]]];
        if cb != 0.0 {
            for j in 0..=ncols {
                t[[m, j]] -= cb * t[[i, j]];
            }
        }
    }

    // Bland 规则主循环: 不会循环, 代价是迭代次数稍多.
    let mut pivots = 0usize;
    loop {
        let entering = (0..ncols).find(|&j| t[[m, j]] < -TOL);
        let Some(entering) = entering else {
            break;
        };

        let mut leaving: Option<usize> = None;
        let mut best_ratio = f64::INFINITY;
        for i in 0..m {
            if t[[i, entering]] > TOL {
                let ratio = t[[i, ncols]] / t[[i, entering]];
                let better = match leaving {
                    None => true,
                    Some(cur) => {
                        ratio < best_ratio - TOL
                            || (ratio < best_ratio + TOL && basis[i] < basis[cur])
                    }
                };
                if better {
                    best_ratio = ratio;
                    leaving = Some(i);
                }
            }
        }
        let Some(leaving) = leaving else {
            return Err(SolveError::Unbounded);
        };

        // 主元消去.
        let pivot = t[[leaving, entering]];
        for j in 0..=ncols {
            t[[leaving, j]] /= pivot;
        }
        for i in 0..=m {
            if i == leaving {
                continue;
            }
            let factor = t[[i, entering]];
            if factor != 0.0 {
                for j in 0..=ncols {
                    t[[i, j]] -= factor * t[[leaving, j]];
                }
            }
        }
        basis[leaving] = entering;

        pivots += 1;
        if pivots > max_pivots {
            return Err(SolveError::PivotBudgetExceeded);
        }
    }

    // 人工变量残留非零意味着原问题不可行.
    for i in 0..m {
        if basis[i] >= art_begin && t[[i, ncols]] > FEAS_TOL {
            return Err(SolveError::Infeasible);
        }
    }

    let mut x = lower.to_vec();
    for i in 0..m {
        if basis[i] < n {
            x[basis[i]] = lower[basis[i]] + t[[i, ncols]];
        }
    }

    let objective: f64 = (0..n)
        .map(|j| problem.objective().coefficient(j) * x[j])
        .sum();

    Ok(LpSolution { x, objective })
}
