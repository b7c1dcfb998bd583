//! 页面尺寸与方向

use serde::{Deserialize, Serialize};
use std::fmt;

/// 每点毫米数（1 pt = 1/72 inch）
pub const MM_PER_PT: f64 = 0.35277777777777777;

/// 每英寸点数
pub const PT_PER_INCH: f64 = 72.0;

/// 每英寸毫米数
pub const MM_PER_INCH: f64 = 25.4;

/// 纸张大小
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PageFormat {
    A0,
    A1,
    A2,
    A3,
    #[default]
    A4,
    A5,
    A6,
    B4,
    B5,
    Letter,
    Legal,
    Tabloid,
    Custom { width_mm: f64, height_mm: f64 },
}

impl PageFormat {
    /// 预定义的纸张（不含自定义）
    pub const STANDARD: [PageFormat; 12] = [
        PageFormat::A0,
        PageFormat::A1,
        PageFormat::A2,
        PageFormat::A3,
        PageFormat::A4,
        PageFormat::A5,
        PageFormat::A6,
        PageFormat::B4,
        PageFormat::B5,
        PageFormat::Letter,
        PageFormat::Legal,
        PageFormat::Tabloid,
    ];

    /// 纸张尺寸（毫米，纵向）
    pub fn dimensions_mm(&self) -> (f64, f64) {
        match self {
            PageFormat::A0 => (841.0, 1189.0),
            PageFormat::A1 => (594.0, 841.0),
            PageFormat::A2 => (420.0, 594.0),
            PageFormat::A3 => (297.0, 420.0),
            PageFormat::A4 => (210.0, 297.0),
            PageFormat::A5 => (148.0, 210.0),
            PageFormat::A6 => (105.0, 148.0),
            PageFormat::B4 => (250.0, 353.0),
            PageFormat::B5 => (176.0, 250.0),
            PageFormat::Letter => (215.9, 279.4),
            PageFormat::Legal => (215.9, 355.6),
            PageFormat::Tabloid => (279.4, 431.8),
            PageFormat::Custom { width_mm, height_mm } => (*width_mm, *height_mm),
        }
    }

    /// 纸张尺寸（点，纵向）
    pub fn dimensions_pt(&self) -> (f64, f64) {
        let (w, h) = self.dimensions_mm();
        (w / MM_PER_PT, h / MM_PER_PT)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PageFormat::A0 => "A0",
            PageFormat::A1 => "A1",
            PageFormat::A2 => "A2",
            PageFormat::A3 => "A3",
            PageFormat::A4 => "A4",
            PageFormat::A5 => "A5",
            PageFormat::A6 => "A6",
            PageFormat::B4 => "B4",
            PageFormat::B5 => "B5",
            PageFormat::Letter => "Letter",
            PageFormat::Legal => "Legal",
            PageFormat::Tabloid => "Tabloid",
            PageFormat::Custom { .. } => "Custom",
        }
    }
}

/// 下拉列表中的显示文本，如 `A4 (210 x 297 mm)`
impl fmt::Display for PageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.dimensions_mm();
        write!(f, "{} ({} x {} mm)", self.name(), w, h)
    }
}

/// 纸张方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PageOrientation {
    #[default]
    Portrait,
    Landscape,
}

impl PageOrientation {
    /// 按方向调整纵向尺寸
    pub fn apply(&self, (w, h): (f64, f64)) -> (f64, f64) {
        match self {
            PageOrientation::Portrait => (w, h),
            PageOrientation::Landscape => (h, w),
        }
    }
}
