//! 默认整数求解后端: 线性松弛上的 branch-and-bound.

use super::simplex::{solve_relaxation, LpSolution};
use super::{LinearSolver, Solution, SolveError};
use crate::ilp::{IlpProblem, Sense, VariableType};

/// branch-and-bound 精确求解器.
///
/// 对每个节点求解线性松弛, 按最大分数性选取分支变量,
/// 用当前最优整数解剪枝. 对本库产生的规划规模足够快.
#[derive(Debug, Clone)]
pub struct BranchBoundSolver {
    /// 最多展开的节点数.
    pub max_nodes: usize,

    /// 判定整数可行的容差.
    pub int_tol: f64,

    /// 剪枝时允许的目标值间隙.
    pub gap_tol: f64,

    /// 每次线性松弛允许的最大单纯形迭代数.
    pub max_pivots: usize,
}

impl Default for BranchBoundSolver {
    fn default() -> Self {
        Self {
            max_nodes: 100_000,
            int_tol: 1e-6,
            gap_tol: 1e-9,
            max_pivots: 500_000,
        }
    }
}

/// 分支定界搜索树节点: 一组变量上下界与父节点的松弛目标值.
struct BnbNode {
    lower: Vec<f64>,
    upper: Vec<f64>,
    bound: f64,
}

impl LinearSolver for BranchBoundSolver {
    fn solve(&self, problem: &IlpProblem) -> Result<Solution, SolveError> {
        let n = problem.num_variables();
        if n == 0 {
            return Ok(Solution::new(vec![], 0.0));
        }

        // 统一按 "分数越小越好" 剪枝; 极大化时取负.
        let maximize = problem.objective().sense() == Sense::Maximize;
        let score = |objective: f64| if maximize { -objective } else { objective };

        let integral: Vec<bool> = (0..n)
            .map(|j| problem.variable_type(j).is_integral())
            .collect();
        let base_upper: Vec<f64> = (0..n)
            .map(|j| match problem.variable_type(j) {
                VariableType::Binary => 1.0,
                _ => f64::INFINITY,
            })
            .collect();

        let mut stack = vec![BnbNode {
            lower: vec![0.0; n],
            upper: base_upper,
            bound: f64::NEG_INFINITY,
        }];

        let mut best: Option<(Vec<f64>, f64)> = None;
        let mut explored = 0usize;

        while let Some(node) = stack.pop() {
            explored += 1;
            if explored > self.max_nodes {
                break;
            }

            if let Some((_, best_score)) = &best {
                if node.bound >= best_score - self.gap_tol {
                    continue;
                }
            }

            let relaxed: LpSolution =
                match solve_relaxation(problem, &node.lower, &node.upper, self.max_pivots) {
                    Ok(r) => r,
                    Err(SolveError::Infeasible) => continue,
                    Err(e) => return Err(e),
                };
            let relaxed_score = score(relaxed.objective);

            if let Some((_, best_score)) = &best {
                if relaxed_score >= best_score - self.gap_tol {
                    continue;
                }
            }

            // 最大分数性分支.
            let mut branch_var = None;
            let mut max_fractionality = 0.0;
            for (j, &xj) in relaxed.x.iter().enumerate() {
                if !integral[j] {
                    continue;
                }
                let frac = xj - xj.floor();
                let fractionality = frac.min(1.0 - frac);
                if fractionality > self.int_tol && fractionality > max_fractionality {
                    max_fractionality = fractionality;
                    branch_var = Some(j);
                }
            }

            let Some(var) = branch_var else {
                // 整数可行: 更新当前最优.
                if best.as_ref().map_or(true, |(_, s)| relaxed_score < *s) {
                    best = Some((relaxed.x, relaxed_score));
                }
                continue;
            };

            let xj = relaxed.x[var];

            // 左子: x[var] <= floor.
            let mut left_upper = node.upper.clone();
            left_upper[var] = left_upper[var].min(xj.floor());
            if node.lower[var] <= left_upper[var] {
                stack.push(BnbNode {
                    lower: node.lower.clone(),
                    upper: left_upper,
                    bound: relaxed_score,
                });
            }

            // 右子: x[var] >= ceil.
            let mut right_lower = node.lower.clone();
            right_lower[var] = right_lower[var].max(xj.ceil());
            if right_lower[var] <= node.upper[var] {
                stack.push(BnbNode {
                    lower: right_lower,
                    upper: node.upper,
                    bound: relaxed_score,
                });
            }
        }

        match best {
            Some((x, _)) => {
                // 整数变量取整后重算目标值.
                let x: Vec<f64> = x
                    .into_iter()
                    .zip(integral.iter())
                    .map(|(xj, &is_int)| if is_int { xj.round() } else { xj })
                    .collect();
                let objective: f64 = (0..n)
                    .map(|j| problem.objective().coefficient(j) * x[j])
                    .sum();
                Ok(Solution::new(x, objective))
            }
            None if explored > self.max_nodes => {
                Err(SolveError::NodeBudgetExceeded { explored })
            }
            None => Err(SolveError::Infeasible),
        }
    }
}
