//! 平面仿射变换
//!
//! 单元实例的放置（镜像、旋转、放大、平移）以及版图坐标到页面坐标的映射。

use crate::math::{BoundingBox2, Matrix3, Point2, Vector2};
use serde::{Deserialize, Serialize};

/// 齐次坐标下的 3x3 仿射变换
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform2D {
    m: Matrix3,
}

/// 角度的余弦和正弦；90° 的整数倍给出精确值
fn cos_sin_deg(angle_deg: f64) -> (f64, f64) {
    let quarter = angle_deg / 90.0;
    if quarter.fract() == 0.0 {
        match (quarter as i64).rem_euclid(4) {
            0 => (1.0, 0.0),
            1 => (0.0, 1.0),
            2 => (-1.0, 0.0),
            _ => (0.0, -1.0),
        }
    } else {
        let r = angle_deg.to_radians();
        (r.cos(), r.sin())
    }
}

impl Transform2D {
    fn from_linear(a: f64, b: f64, c: f64, d: f64, dx: f64, dy: f64) -> Self {
        #[rustfmt::skip]
        let m = Matrix3::new(
            a,   b,   dx,
            c,   d,   dy,
            0.0, 0.0, 1.0,
        );
        Self { m }
    }

    pub fn identity() -> Self {
        Self { m: Matrix3::identity() }
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self::from_linear(1.0, 0.0, 0.0, 1.0, dx, dy)
    }

    /// 轴向缩放；`sy` 为负时同时翻转 Y 轴
    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::from_linear(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// 单元实例放置变换
    ///
    /// 作用顺序：沿 X 轴镜像，逆时针旋转 `angle_deg`，放大 `mag`，平移 `disp`。
    pub fn placement(disp: Vector2, angle_deg: f64, mirror: bool, mag: f64) -> Self {
        let (cos, sin) = cos_sin_deg(angle_deg);
        let flip = if mirror { -1.0 } else { 1.0 };
        Self::from_linear(mag * cos, -mag * sin * flip, mag * sin, mag * cos * flip, disp.x, disp.y)
    }

    /// 复合变换：先应用 `inner`，再应用 `self`
    pub fn then(&self, inner: &Transform2D) -> Self {
        Self { m: self.m * inner.m }
    }

    pub fn transform_point(&self, p: &Point2) -> Point2 {
        let m = &self.m;
        Point2::new(
            m[(0, 0)] * p.x + m[(0, 1)] * p.y + m[(0, 2)],
            m[(1, 0)] * p.x + m[(1, 1)] * p.y + m[(1, 2)],
        )
    }

    /// 四个角变换后的包围盒
    pub fn transform_bbox(&self, bbox: &BoundingBox2) -> BoundingBox2 {
        if bbox.is_empty() {
            return *bbox;
        }
        BoundingBox2::from_points(bbox.corners().iter().map(|p| self.transform_point(p)))
    }

    fn determinant(&self) -> f64 {
        self.m[(0, 0)] * self.m[(1, 1)] - self.m[(0, 1)] * self.m[(1, 0)]
    }

    pub fn is_mirrored(&self) -> bool {
        self.determinant() < 0.0
    }

    pub fn magnification(&self) -> f64 {
        self.determinant().abs().sqrt()
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::approx_eq;

    fn assert_point(p: Point2, x: f64, y: f64) {
        assert!(approx_eq(p.x, x) && approx_eq(p.y, y), "got ({}, {}), want ({}, {})", p.x, p.y, x, y);
    }

    #[test]
    fn test_translation_and_scale() {
        let t = Transform2D::translation(10.0, 20.0).then(&Transform2D::scale(2.0, -1.0));
        assert_point(t.transform_point(&Point2::new(5.0, 5.0)), 20.0, 15.0);
        assert!(t.is_mirrored());
    }

    #[test]
    fn test_placement_mirror_before_rotation() {
        // (1, 1) 镜像为 (1, -1)，旋转 90° 为 (1, 1)
        let t = Transform2D::placement(Vector2::new(100.0, 0.0), 90.0, true, 1.0);
        assert_point(t.transform_point(&Point2::new(1.0, 1.0)), 101.0, 1.0);
        assert!(t.is_mirrored());

        let r = Transform2D::placement(Vector2::new(0.0, 0.0), 270.0, false, 1.0);
        assert_point(r.transform_point(&Point2::new(2.0, 0.0)), 0.0, -2.0);
        assert!(!r.is_mirrored());
    }

    #[test]
    fn test_placement_bbox_and_magnification() {
        let t = Transform2D::placement(Vector2::new(0.0, 0.0), 90.0, false, 2.0);
        let b = t.transform_bbox(&BoundingBox2::from_ltrb(0.0, 0.0, 2.0, 1.0));
        assert!(approx_eq(b.width(), 2.0));
        assert!(approx_eq(b.height(), 4.0));
        assert!(approx_eq(t.magnification(), 2.0));
        assert!(t.transform_bbox(&BoundingBox2::empty()).is_empty());
    }

    #[test]
    fn test_nested_placement() {
        let outer = Transform2D::placement(Vector2::new(10.0, 0.0), 0.0, false, 1.0);
        let inner = Transform2D::placement(Vector2::new(0.0, 5.0), 180.0, false, 1.0);
        assert_point(outer.then(&inner).transform_point(&Point2::new(1.0, 0.0)), 9.0, 5.0);
    }
}
