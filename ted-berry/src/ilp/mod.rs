//! 线性约束、目标函数与整数规划问题的数据表示.

use std::collections::BTreeMap;

mod builder;

pub use builder::TedIlp;

/// 线性约束的比较关系.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// 左端不大于右端.
    LessEqual,

    /// 左端不小于右端.
    GreaterEqual,

    /// 左端等于右端.
    Equal,
}

/// 变量类型.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariableType {
    /// 连续变量, 下界 0.
    #[default]
    Continuous,

    /// 非负整数变量.
    Integer,

    /// 0-1 变量.
    Binary,
}

impl VariableType {
    /// 变量是否要求取整数值?
    #[inline]
    pub fn is_integral(&self) -> bool {
        !matches!(self, Self::Continuous)
    }
}

/// 单条线性约束: `sum(coef * var) relation value`.
///
/// 系数以稀疏形式存储, 未设置的变量系数为 0.
#[derive(Debug, Clone, Default)]
pub struct LinearConstraint {
    coefficients: BTreeMap<usize, f64>,
    relation: Option<Relation>,
    value: f64,
}

impl LinearConstraint {
    /// 创建空约束. 关系与右端值需此后设置.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置变量 `var` 的系数. 重复设置时覆盖旧值.
    #[inline]
    pub fn set_coefficient(&mut self, var: usize, coef: f64) {
        self.coefficients.insert(var, coef);
    }

    /// 设置比较关系.
    #[inline]
    pub fn set_relation(&mut self, relation: Relation) {
        self.relation = Some(relation);
    }

    /// 设置右端值.
    #[inline]
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    /// 按变量下标升序迭代非零系数.
    #[inline]
    pub fn coefficients(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.coefficients.iter().map(|(k, v)| (*k, *v))
    }

    /// 获取比较关系. 若从未设置则 panic.
    #[inline]
    pub fn relation(&self) -> Relation {
        self.relation.expect("约束的比较关系从未设置")
    }

    /// 获取右端值.
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// 优化方向.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sense {
    /// 最小化.
    #[default]
    Minimize,

    /// 最大化.
    Maximize,
}

/// 线性目标函数.
#[derive(Debug, Clone)]
pub struct LinearObjective {
    coefficients: Vec<f64>,
    sense: Sense,
}

impl LinearObjective {
    /// 创建 `num_variables` 个变量的零目标, 默认最小化.
    pub fn new(num_variables: usize) -> Self {
        Self {
            coefficients: vec![0.0; num_variables],
            sense: Sense::default(),
        }
    }

    /// 设置变量 `var` 的目标系数.
    #[inline]
    pub fn set_coefficient(&mut self, var: usize, coef: f64) {
        self.coefficients[var] = coef;
    }

    /// 获取变量 `var` 的目标系数.
    #[inline]
    pub fn coefficient(&self, var: usize) -> f64 {
        self.coefficients[var]
    }

    /// 设置优化方向.
    #[inline]
    pub fn set_sense(&mut self, sense: Sense) {
        self.sense = sense;
    }

    /// 获取优化方向.
    #[inline]
    pub fn sense(&self) -> Sense {
        self.sense
    }
}

/// 一个完整的 (混合) 整数线性规划问题.
#[derive(Debug, Clone)]
pub struct IlpProblem {
    objective: LinearObjective,
    constraints: Vec<LinearConstraint>,
    variable_types: Vec<VariableType>,
}

impl IlpProblem {
    /// 创建 `num_variables` 个变量的空问题, 所有变量为 `default_type`.
    pub fn new(num_variables: usize, default_type: VariableType) -> Self {
        Self {
            objective: LinearObjective::new(num_variables),
            constraints: Vec::new(),
            variable_types: vec![default_type; num_variables],
        }
    }

    /// 获取变量个数.
    #[inline]
    pub fn num_variables(&self) -> usize {
        self.variable_types.len()
    }

    /// 设置变量类型.
    #[inline]
    pub fn set_variable_type(&mut self, var: usize, ty: VariableType) {
        self.variable_types[var] = ty;
    }

    /// 获取变量类型.
    #[inline]
    pub fn variable_type(&self, var: usize) -> VariableType {
        self.variable_types[var]
    }

    /// 追加一条约束.
    #[inline]
    pub fn add(&mut self, constraint: LinearConstraint) {
        self.constraints.push(constraint);
    }

    /// 获取全部约束.
    #[inline]
    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    /// 获取目标函数.
    #[inline]
    pub fn objective(&self) -> &LinearObjective {
        &self.objective
    }

    /// 获取目标函数并可就地修改.
    #[inline]
    pub fn objective_mut(&mut self) -> &mut LinearObjective {
        &mut self.objective
    }
}
