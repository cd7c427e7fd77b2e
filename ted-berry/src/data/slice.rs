//! 二维水平标签切片视图.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use ndarray::iter::{Iter, IterMut};
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Ix2};
use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::ops::{Index, IndexMut};

use crate::{Idx2d, Label};

/// 不可变、借用的二维水平标签切片.
pub struct LabelSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::LabelStack`].
    ///
    /// 这里有意把代码写死为 `ArrayView` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayView2<'a, f32>,
}

/// 可变、借用的二维水平标签切片.
pub struct LabelSliceMut<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::LabelStack`].
    data: ArrayViewMut2<'a, f32>,
}

macro_rules! impl_label_slice_immut {
    ($lifetime: lifetime, $type: ty, $view: ty) => {
        impl<$lifetime> $type {
            /// 从底层视图直接创建.
            #[inline]
            pub fn new(data: $view) -> Self {
                Self { data }
            }

            /// 获取切片形状, 按照 (高, 宽) 排列.
            #[inline]
            pub fn shape(&self) -> Idx2d {
                self.data.dim()
            }

            /// 获取切片的像素总数.
            #[inline]
            pub fn size(&self) -> usize {
                let (h, w) = self.shape();
                h * w
            }

            /// 获取给定位置 (高, 宽) 的标签值. 越界时返回 `None`.
            #[inline]
            pub fn get(&self, pos: Idx2d) -> Option<f32> {
                self.data.get(pos).copied()
            }

            /// 获取按行优先序迭代标签的迭代器.
            #[inline]
            pub fn iter(&self) -> Iter<'_, f32, Ix2> {
                self.data.iter()
            }

            /// 获取按行优先序迭代 (高, 宽) 索引的迭代器.
            pub fn pos_iter(&self) -> impl Iterator<Item = Idx2d> {
                let (h, w) = self.shape();
                (0..h).flat_map(move |first| (0..w).map(move |second| (first, second)))
            }

            /// 获取切片中标签值恰好为 `label` 的像素个数.
            ///
            /// 标签按照位级相等进行比较.
            #[inline]
            pub fn count(&self, label: f32) -> usize {
                self.data.iter().filter(|p| p.to_bits() == label.to_bits()).count()
            }

            /// 收集切片中出现过的所有不同标签值, 按升序排列.
            pub fn distinct_labels(&self) -> BTreeSet<Label> {
                self.data.iter().map(|p| Label::from(*p)).collect()
            }

            /// 深拷贝出一个拥有所有权的切片.
            #[inline]
            pub fn to_owned(&self) -> OwnedLabelSlice {
                OwnedLabelSlice::from(self.data.to_owned())
            }
        }

        impl<$lifetime> Index<Idx2d> for $type {
            type Output = f32;

            #[inline]
            fn index(&self, index: Idx2d) -> &Self::Output {
                &self.data[index]
            }
        }
    };
}
impl_label_slice_immut!('a, LabelSlice<'a>, ArrayView2<'a, f32>);
impl_label_slice_immut!('a, LabelSliceMut<'a>, ArrayViewMut2<'a, f32>);

impl IndexMut<Idx2d> for LabelSliceMut<'_> {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

/// 可变方法集合.
impl<'a> LabelSliceMut<'a> {
    /// 获取可以迭代并修改标签的迭代器.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, f32, Ix2> {
        self.data.iter_mut()
    }

    /// 获取给定位置 (高, 宽) 的标签值, 并可就地修改. 越界时返回 `None`.
    #[inline]
    pub fn get_mut(&mut self, pos: Idx2d) -> Option<&mut f32> {
        self.data.get_mut(pos)
    }

    /// 将切片整体填充为 `label`.
    #[inline]
    pub fn fill(&mut self, label: f32) {
        self.data.fill(label);
    }

    /// 将切片中值为 `old` 的标签全部替换为 `new`. 返回总共成功替换的个数.
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
}

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 拥有所有权的二维水平标签切片.
///
/// `OwnedLabelSlice` 仅提供到 `LabelSlice` 和 `LabelSliceMut`
/// 的轻量转换和底层数据移动, 不提供任何其它方法.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct OwnedLabelSlice {
    data: Array2<f32>,
}

impl From<Array2<f32>> for OwnedLabelSlice {
    #[inline]
    fn from(data: Array2<f32>) -> Self {
        Self { data }
    }
}

impl OwnedLabelSlice {
    /// 获得不可变切片引用.
    #[inline]
    pub fn as_immut(&self) -> LabelSlice<'_> {
        LabelSlice::new(self.data.view())
    }

    /// 获得可变切片引用.
    #[inline]
    pub fn as_mutable(&mut self) -> LabelSliceMut<'_> {
        LabelSliceMut::new(self.data.view_mut())
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array2<f32> {
        self.data
    }

    /// 压缩数据.
    ///
    /// 标签以小端字节序写入压缩流.
    pub fn compress(&self) -> CompactLabelSlice {
        let sh = self.as_immut().shape();
        let mut e = ZlibEncoder::new(Vec::with_capacity(8), Compression::best());
        for v in self.data.iter() {
            e.write_all(&v.to_le_bytes()).expect("Compression error");
        }
        CompactLabelSlice {
            buf: e.finish().expect("Compression error"),
            sh,
        }
    }
}

/// 压缩存储的 `OwnedLabelSlice`; 不透明类型.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompactLabelSlice {
    /// 压缩的不透明字节流.
    buf: Vec<u8>,

    /// 形状.
    sh: Idx2d,
}

impl CompactLabelSlice {
    /// 获取压缩后的字节数.
    #[inline]
    pub fn compressed_len(&self) -> usize {
        self.buf.len()
    }

    /// 解压缩数据.
    pub fn decompress(self) -> OwnedLabelSlice {
        let Self { buf, sh: (h, w) } = self;
        let mut d = ZlibDecoder::new(buf.as_slice());
        let mut raw = Vec::with_capacity(h * w * 4);
        d.read_to_end(&mut raw).expect("Decompression error");
        debug_assert_eq!(raw.len(), h * w * 4);
        let data = raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let data = Array2::<f32>::from_shape_vec((h, w), data).unwrap();
        OwnedLabelSlice { data }
    }
}

#[cfg(test)]
mod tests {
    use super::OwnedLabelSlice;
    use ndarray::array;

    /// 压缩后解压必须原样恢复标签数据.
    #[test]
    fn test_compact_resume() {
        let owned = OwnedLabelSlice::from(array![[1.0_f32, 2.0, 64.5], [0.0, -0.0, 3.0]]);
        let compact = owned.clone().compress();
        let resumed = compact.decompress();

        assert_eq!(owned.as_immut().shape(), resumed.as_immut().shape());
        for (a, b) in owned.as_immut().iter().zip(resumed.as_immut().iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    /// 常标签切片应当压缩得很小.
    #[test]
    fn test_compact_small() {
        let owned = OwnedLabelSlice::from(ndarray::Array2::<f32>::zeros((64, 64)));
        let compact = owned.compress();
        assert!(compact.compressed_len() < 64 * 64 * 4 / 8);
    }

    /// 替换计数必须与实际修改个数一致.
    #[test]
    fn test_replace_count() {
        let mut owned = OwnedLabelSlice::from(array![[1.0_f32, 2.0], [1.0, 3.0]]);
        let mut sli = owned.as_mutable();
        assert_eq!(sli.replace(1.0, 9.0), 2);
        assert_eq!(sli.count(9.0), 2);
        assert_eq!(sli.count(1.0), 0);
    }
}
