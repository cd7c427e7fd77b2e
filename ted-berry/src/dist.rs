//! 各向异性平方欧氏距离变换.
//!
//! 可分离的 Felzenszwalb-Huttenlocher 下包络算法, 每个轴带各自的
//! 体素间距权重, 结果精确而非近似. 轴 `k` 上相差 `d` 个体素的两点
//! 贡献 `(pitch[k] * d)^2`.

use ndarray::Array3;
use num::Float;

/// 不存在源体素时的距离哨兵. 取有限大值以避免包络推导中出现 `inf - inf`.
const UNREACHED: f64 = 1e18;

/// 对三维 mask 计算各向异性平方欧氏距离场.
///
/// `mask` 中非零体素为源, 源处距离为 0; 其余体素得到到最近源的
/// 平方欧氏距离, 单位为纳米平方. `pitch_nm` 按照 (z, 高, 宽) 排列,
/// 以纳米为单位, 所有分量必须为正, 否则程序 panic.
///
/// # 注意
///
/// 若 `mask` 全零, 则所有体素的距离为一个极大哨兵值.
pub fn squared_edt(mask: &Array3<f32>, pitch_nm: [f64; 3]) -> Array3<f32> {
    assert!(
        pitch_nm.iter().all(|p| *p > 0.0),
        "体素间距 {pitch_nm:?} 必须为正"
    );

    let dim = mask.dim();
    let shape = [dim.0, dim.1, dim.2];
    let mut field: Vec<f64> = mask
        .iter()
        .map(|&v| if v != 0.0 { 0.0 } else { UNREACHED })
        .collect();

    // 按 (z, 高, 宽) 依次做一维变换. `field` 是行优先布局,
    // 与 `mask.iter()` 的迭代顺序一致.
    for axis in 0..3 {
        let n = shape[axis];
        if n <= 1 {
            continue;
        }
        let stride: usize = shape[axis + 1..].iter().product();
        let outer: usize = shape[..axis].iter().product();
        let w2 = pitch_nm[axis] * pitch_nm[axis];

        let mut line = vec![0.0f64; n];
        for outer_idx in 0..outer {
            for inner_idx in 0..stride {
                for (i, f_val) in line.iter_mut().enumerate() {
                    let flat = outer_idx * (n * stride) + i * stride + inner_idx;
                    *f_val = field[flat];
                }

                let dt = edt_1d_squared(&line, w2);

                for (i, &dt_val) in dt.iter().enumerate() {
                    let flat = outer_idx * (n * stride) + i * stride + inner_idx;
                    field[flat] = dt_val;
                }
            }
        }
    }

    let field: Vec<f32> = field.into_iter().map(|d| d as f32).collect();
    // 该操作不会生成 `Err`, 可直接 unwrap.
    Array3::from_shape_vec(dim, field).unwrap()
}

/// 一维带权平方距离变换 (Felzenszwalb-Huttenlocher 抛物线下包络).
///
/// 计算 `d(q) = min_p (w2 * (q - p)^2 + f(p))`.
pub fn edt_1d_squared<T: Float>(f: &[T], w2: T) -> Vec<T> {
    let n = f.len();
    if n == 0 {
        return vec![];
    }

    let two = T::one() + T::one();
    let mut d = vec![T::zero(); n];
    let mut v = vec![0usize; n]; // 抛物线顶点位置
    let mut z = vec![T::zero(); n + 1]; // 抛物线之间的分界
    let mut k = 0usize; // 下包络中的抛物线个数

    v[0] = 0;
    z[0] = T::neg_infinity();
    z[1] = T::infinity();

    // usize 到 T 的转换不会失败, 可直接 unwrap.
    let idx = |i: usize| T::from(i).unwrap();

    for q in 1..n {
        loop {
            let vk = idx(v[k]);
            let qq = idx(q);
            let s = ((f[q] + w2 * qq * qq) - (f[v[k]] + w2 * vk * vk)) / (two * w2 * (qq - vk));

            if s > z[k] {
                k += 1;
                v[k] = q;
                z[k] = s;
                z[k + 1] = T::infinity();
                break;
            }
            if k == 0 {
                v[0] = q;
                z[0] = T::neg_infinity();
                z[1] = T::infinity();
                break;
            }
            k -= 1;
        }
    }

    k = 0;
    for (q, d_val) in d.iter_mut().enumerate() {
        while z[k + 1] < idx(q) {
            k += 1;
        }
        let diff = idx(q) - idx(v[k]);
        *d_val = w2 * diff * diff + f[v[k]];
    }

    d
}
