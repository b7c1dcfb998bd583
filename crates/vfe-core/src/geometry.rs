//! 版图图形
//!
//! 支持的图形：
//! - 矩形 (Box)
//! - 多边形 (Polygon)
//! - 路径 (Path)，导出时按线宽展开为多边形
//! - 文本 (Text)

use crate::math::{BoundingBox2, Point2, Vector2, EPSILON};
use crate::transform::Transform2D;
use serde::{Deserialize, Serialize};

/// 图形枚举
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Box(BoundingBox2),
    Polygon(Polygon),
    Path(Path),
    Text(Text),
}

impl Shape {
    /// 获取图形的包围盒
    pub fn bounding_box(&self) -> BoundingBox2 {
        match self {
            Shape::Box(b) => *b,
            Shape::Polygon(p) => p.bounding_box(),
            Shape::Path(p) => p.bounding_box(),
            Shape::Text(t) => BoundingBox2::new(t.position, t.position),
        }
    }

    /// 获取图形的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            Shape::Box(_) => "Box",
            Shape::Polygon(_) => "Polygon",
            Shape::Path(_) => "Path",
            Shape::Text(_) => "Text",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Shape::Text(_))
    }

    /// 外轮廓点（文本没有轮廓）
    pub fn hull(&self) -> Option<Vec<Point2>> {
        match self {
            Shape::Box(b) => Some(b.corners().to_vec()),
            Shape::Polygon(p) => Some(p.hull.clone()),
            Shape::Path(p) => Some(p.to_polygon().hull),
            Shape::Text(_) => None,
        }
    }

    /// 变换后的外轮廓点
    pub fn transformed_hull(&self, trans: &Transform2D) -> Option<Vec<Point2>> {
        self.hull()
            .map(|pts| pts.iter().map(|p| trans.transform_point(p)).collect())
    }
}

/// 多边形（只有外轮廓）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub hull: Vec<Point2>,
}

impl Polygon {
    pub fn new(hull: Vec<Point2>) -> Self {
        Self { hull }
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::from_points(self.hull.iter().copied())
    }

    /// 有向面积（逆时针为正）
    pub fn signed_area(&self) -> f64 {
        let n = self.hull.len();
        if n < 3 {
            return 0.0;
        }
        let mut area = 0.0;
        for i in 0..n {
            let a = self.hull[i];
            let b = self.hull[(i + 1) % n];
            area += a.x * b.y - b.x * a.y;
        }
        area / 2.0
    }
}

/// 路径：中心线 + 线宽，端部平齐
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub spine: Vec<Point2>,
    pub width: f64,
}

impl Path {
    pub fn new(spine: Vec<Point2>, width: f64) -> Self {
        Self { spine, width }
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        self.to_polygon().bounding_box()
    }

    /// 展开为多边形，拐角使用斜接
    pub fn to_polygon(&self) -> Polygon {
        let pts = dedup_points(&self.spine);
        let hw = self.width.abs() / 2.0;
        if pts.len() < 2 || hw < EPSILON {
            return Polygon::new(pts);
        }

        let normals: Vec<Vector2> = pts
            .windows(2)
            .map(|w| {
                let d = (w[1] - w[0]).normalize();
                Vector2::new(-d.y, d.x)
            })
            .collect();

        let mut left = Vec::with_capacity(pts.len());
        let mut right = Vec::with_capacity(pts.len());
        for (i, p) in pts.iter().enumerate() {
            let offset = if i == 0 {
                normals[0] * hw
            } else if i == pts.len() - 1 {
                normals[i - 1] * hw
            } else {
                let n_prev = normals[i - 1];
                let sum = n_prev + normals[i];
                if sum.norm() < EPSILON {
                    // 折返：退化为沿前一段的法向
                    n_prev * hw
                } else {
                    let miter = sum.normalize();
                    miter * (hw / miter.dot(&n_prev))
                }
            };
            left.push(p + offset);
            right.push(p - offset);
        }

        right.reverse();
        left.extend(right);
        Polygon::new(left)
    }
}

fn dedup_points(points: &[Point2]) -> Vec<Point2> {
    let mut out: Vec<Point2> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().map_or(true, |q| (p - q).norm() > EPSILON) {
            out.push(*p);
        }
    }
    out
}

/// 文本水平对齐
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// 文本垂直对齐
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VAlign {
    #[default]
    Bottom,
    Center,
    Top,
}

/// 文本标签
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub string: String,
    pub position: Point2,
    #[serde(default)]
    pub halign: HAlign,
    #[serde(default)]
    pub valign: VAlign,
    /// 文本高度（µm）；`None` 时使用导出设置中的字号
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
}

impl Text {
    pub fn new(string: impl Into<String>, position: Point2) -> Self {
        Self {
            string: string.into(),
            position,
            halign: HAlign::default(),
            valign: VAlign::default(),
            size: None,
        }
    }

    pub fn with_alignment(mut self, halign: HAlign, valign: VAlign) -> Self {
        self.halign = halign;
        self.valign = valign;
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }
}
