//! 数学基础类型
//!
//! 基于 nalgebra 提供的向量和点类型的别名。版图坐标统一使用微米（µm）。

use nalgebra as na;
use serde::{Deserialize, Serialize};

/// 2D点类型
pub type Point2 = na::Point2<f64>;

/// 2D向量类型
pub type Vector2 = na::Vector2<f64>;

/// 2D变换矩阵
pub type Matrix3 = na::Matrix3<f64>;

/// 几何比较的容差
pub const EPSILON: f64 = 1e-10;

/// 在 [`EPSILON`] 容差内相等
#[inline]
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// 2D包围盒
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox2 {
    pub min: Point2,
    pub max: Point2,
}

impl BoundingBox2 {
    pub fn new(min: Point2, max: Point2) -> Self {
        Self { min, max }
    }

    /// 由左、下、右、上坐标创建
    pub fn from_ltrb(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self {
            min: Point2::new(left.min(right), bottom.min(top)),
            max: Point2::new(left.max(right), bottom.max(top)),
        }
    }

    /// 空包围盒：min 大于 max
    pub fn empty() -> Self {
        Self {
            min: Point2::new(f64::MAX, f64::MAX),
            max: Point2::new(f64::MIN, f64::MIN),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// 点集的包围盒；空点集得到空包围盒
    pub fn from_points(points: impl IntoIterator<Item = Point2>) -> Self {
        points.into_iter().fold(Self::empty(), |bbox, p| bbox.union(&Self::new(p, p)))
    }

    /// 合并；空包围盒不参与
    pub fn union(&self, other: &Self) -> Self {
        match (self.is_empty(), other.is_empty()) {
            (true, _) => *other,
            (_, true) => *self,
            _ => Self {
                min: Point2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
                max: Point2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
            },
        }
    }

    /// 向四周扩大 `d`
    pub fn enlarged(&self, d: f64) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self::from_ltrb(self.min.x - d, self.min.y - d, self.max.x + d, self.max.y + d)
    }

    /// 四个角点，从左下开始逆时针
    pub fn corners(&self) -> [Point2; 4] {
        [
            self.min,
            Point2::new(self.max.x, self.min.y),
            self.max,
            Point2::new(self.min.x, self.max.y),
        ]
    }

    pub fn center(&self) -> Point2 {
        na::center(&self.min, &self.max)
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max.x - self.min.x
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max.y - self.min.y
        }
    }
}

impl Default for BoundingBox2 {
    fn default() -> Self {
        Self::empty()
    }
}
