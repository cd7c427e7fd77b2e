use std::collections::BTreeSet;
use std::ops::{Index, IndexMut};
use std::path::Path;

use ndarray::{Array3, ArrayView, ArrayViewMut, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::{Idx2d, Idx3d, Label};

mod slice;

pub use slice::{CompactLabelSlice, LabelSlice, LabelSliceMut, OwnedLabelSlice};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [W, H, z]. 体素个数数组.
    let [_, w, h, z, ..] = h.dim;
    (z as usize, h as usize, w as usize)
}

/// nii 格式 3D 标签堆栈, 包括 header 和标签数据. 标签值以 `f32` 保存.
///
/// 旧数据源将整数标签存成浮点, 本结构原样保留该表示;
/// 所有标签比较均按位级相等进行.
#[derive(Debug, Clone)]
pub struct LabelStack {
    header: BoxedHeader,
    data: Array3<f32>,
}

impl Index<Idx3d> for LabelStack {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for LabelStack {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl LabelStack {
    /// 打开 nii 文件格式的 3D 标签堆栈. `path` 为 nii 文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> nifti::Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        // [W, H, z] -> [z, H, W].
        // hint: 原第一维向下增长, 原第二维向右增长.
        let data = obj
            .into_volume()
            .into_ndarray::<f32>()?
            .permuted_axes([2, 1, 0].as_slice());

        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };

        // 该操作不会生成 `Err`, 可直接 unwrap.
        let data =
            Array3::<f32>::from_shape_vec(get_shape_from_header(&header), data.into_raw_vec())
                .unwrap();

        Ok(Self { header, data })
    }

    /// 根据裸标签数据和体素间距直接创建 `LabelStack` 实体.
    ///
    /// # 参数
    ///
    /// 1. `data` 按照 (z, 高, 宽) 格式存储.
    /// 2. `pitch_nm` 按照 (z, 高, 宽) 格式存储, 以纳米为单位.
    pub fn from_array(data: Array3<f32>, pitch_nm: [f32; 3]) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        debug_assert!(data.is_standard_layout());

        let (z, h, w) = data.dim();
        let mut header = Box::<NiftiHeader>::default();
        header.dim = [3, w as u16, h as u16, z as u16, 1, 1, 1, 1];
        let [pz, ph, pw] = &pitch_nm;
        let [_, hw, hh, hz, ..] = &mut header.pixdim;
        (*hw, *hh, *hz) = (*pw, *ph, *pz);
        header.intent_name[..5].copy_from_slice(b"synth");

        Self { header, data }
    }

    /// 以已有 header 和裸标签数据直接创建.
    ///
    /// `data` 按照 (z, 高, 宽) 格式存储, 形状必须与 `header` 一致,
    /// 否则程序 panic.
    pub fn from_array_with_header(header: &NiftiHeader, data: Array3<f32>) -> Self {
        assert_eq!(
            get_shape_from_header(header),
            data.dim(),
            "header 与数据形状不一致"
        );
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };

        Self {
            header: Box::new(header.clone()),
            data,
        }
    }

    /// 判断该结构是否是由 [`Self::from_array`] 手动拼接的.
    pub fn is_synthetic(&self) -> bool {
        self.header.intent_name.starts_with(b"synth")
    }

    /// 获取 header 部分.
    #[inline]
    pub fn header(&self) -> &NiftiHeader {
        &self.header
    }

    /// 获取数据形状大小, 按照 (z, 高, 宽) 排列.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 获取数据水平切片形状大小.
    #[inline]
    pub fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 检查索引是否合法.
    #[inline]
    pub fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 获取单个体素间距, 以纳米为单位, 按照 (z, 高, 宽) 排列.
    ///
    /// 该值也可以通过 `self.{z_nm, height_nm, width_nm}` 分别获取.
    #[inline]
    pub fn pitch_nm(&self) -> [f64; 3] {
        let [_, w, h, z, ..] = self.header.pixdim;
        [z as f64, h as f64, w as f64]
    }

    /// 获取 width 方向 (自然 2D 图像的水平方向) 体素间距, 以纳米为单位.
    #[inline]
    pub fn width_nm(&self) -> f64 {
        self.header.pixdim[1] as f64
    }

    /// 获取 height 方向 (自然 2D 图像的垂直方向) 体素间距, 以纳米为单位.
    #[inline]
    pub fn height_nm(&self) -> f64 {
        self.header.pixdim[2] as f64
    }

    /// 获取空间方向 (相邻 2D 切片的方向) 体素间距, 以纳米为单位.
    #[inline]
    pub fn z_nm(&self) -> f64 {
        self.header.pixdim[3] as f64
    }

    /// 体素间距在三个维度上是否是各向同的?
    #[inline]
    pub fn is_isotropic(&self) -> bool {
        let [z, h, w] = self.pitch_nm();
        z == h && z == w
    }

    /// 获取 3D 堆栈 z 空间的第 `z_index` 层不可变切片.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> LabelSlice {
        LabelSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取 3D 堆栈 z 空间的第 `z_index` 层可变切片.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at_mut(&mut self, z_index: usize) -> LabelSliceMut {
        LabelSliceMut::new(self.data.index_axis_mut(Axis(0), z_index))
    }

    /// 获取能按升序迭代 3D 堆栈水平不可变切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = LabelSlice> {
        self.data.axis_iter(Axis(0)).map(LabelSlice::new)
    }

    /// 获取能按升序迭代 3D 堆栈水平可变切片的迭代器.
    #[inline]
    pub fn slice_iter_mut(&mut self) -> impl ExactSizeIterator<Item = LabelSliceMut> {
        self.data.axis_iter_mut(Axis(0)).map(LabelSliceMut::new)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut<'_, f32, Ix3> {
        self.data.view_mut()
    }

    /// 获取 3D 堆栈中标签值恰好为 `label` 的体素个数.
    ///
    /// 标签按照位级相等进行比较.
    #[inline]
    pub fn count(&self, label: f32) -> usize {
        self.data
            .iter()
            .filter(|p| p.to_bits() == label.to_bits())
            .count()
    }

    /// 将 3D 堆栈中值为 `old` 的体素全部替换为 `new`.
    ///
    /// 返回总共成功替换的个数.
    pub fn replace(&mut self, old: f32, new: f32) -> usize {
        let mut cnt = 0usize;
        self.data
            .iter_mut()
            .filter(|p| p.to_bits() == old.to_bits())
            .for_each(|p| {
                cnt += 1;
                *p = new;
            });
        cnt
    }

    /// 收集满足谓词 `pred` 的所有体素对应的下标, 结果按行优先存储.
    pub fn filter_pos<F: Fn(f32) -> bool>(&self, pred: F) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(ref pos, pixel)| pred(*pixel).then_some(*pos))
            .collect()
    }

    /// 收集堆栈中出现过的所有不同标签值, 按升序排列.
    pub fn distinct_labels(&self) -> BTreeSet<Label> {
        self.data.iter().map(|p| Label::from(*p)).collect()
    }
}
