//! 矢量绘图接口
//!
//! 导出器只在设备坐标下绘图：单位为点（1/72 英寸），原点在页面左上角，y 轴向下。
//! 各输出格式自行处理坐标系差异（例如 PDF 的 y 轴向上）。

use crate::design_info::DesignInfo;
use crate::error::ExportError;
use crate::pdf::PdfPainter;
use crate::settings::{VectorFileExportSettings, VectorFileFormat};
use crate::svg::SvgPainter;
use vfe_core::bitmap::PixelRect;
use vfe_core::math::Point2;
use vfe_core::properties::Color;

/// 描边样式
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pen {
    pub color: Color,
    /// 线宽（点）
    pub width: f64,
}

impl Pen {
    pub fn new(color: Color, width: f64) -> Self {
        Self { color, width }
    }
}

/// 点阵填充：拼版图案中的矩形，`origin` 为拼版左上角
#[derive(Debug, Clone, Copy)]
pub struct StippleFill<'a> {
    pub origin: Point2,
    /// 每个图案像素的边长（点）
    pub pixel_size: f64,
    pub rects: &'a [PixelRect],
    pub color: Color,
}

/// 等宽字体的近似度量（相对字号）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub char_width: f64,
    pub ascent: f64,
    pub descent: f64,
}

impl Default for FontMetrics {
    fn default() -> Self {
        // Courier
        Self {
            char_width: 0.6,
            ascent: 0.629,
            descent: 0.157,
        }
    }
}

impl FontMetrics {
    pub fn text_width(&self, text: &str, size: f64) -> f64 {
        text.chars().count() as f64 * self.char_width * size
    }

    pub fn text_height(&self, size: f64) -> f64 {
        (self.ascent + self.descent) * size
    }
}

/// 矢量绘图设备
pub trait VectorPainter {
    /// 当前页尺寸（点）
    fn page_size(&self) -> (f64, f64);

    /// 已开始的页数
    fn page_count(&self) -> usize;

    /// 开始新的一页；不支持多页的格式忽略
    fn new_page(&mut self);

    /// 图层分组开始
    fn begin_layer(&mut self, _name: &str) {}

    fn end_layer(&mut self) {}

    /// 无描边填充矩形
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color);

    /// 描边闭合多边形
    fn draw_polygon(&mut self, points: &[Point2], pen: &Pen);

    /// 以多边形为裁剪区域绘制点阵填充
    fn fill_stipple(&mut self, outline: &[Point2], fill: &StippleFill<'_>);

    /// 绘制文本，`position` 为基线左端
    fn draw_text(&mut self, position: Point2, text: &str, font_size: f64, color: Color);

    /// 结束绘图并返回文件内容
    fn finish(&mut self) -> Result<Vec<u8>, ExportError>;
}

/// 按设置中的文件格式创建绘图设备
pub fn create_painter(settings: &VectorFileExportSettings, info: &DesignInfo) -> Box<dyn VectorPainter> {
    match settings.file_format {
        VectorFileFormat::Pdf => Box::new(PdfPainter::new(settings.page_size_pt(), &settings.title)),
        VectorFileFormat::Svg => Box::new(SvgPainter::new(
            info.fig_width_pt(),
            info.fig_height_pt(),
            &settings.title,
            &settings.font_family,
        )),
    }
}
