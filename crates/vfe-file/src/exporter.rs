//! 矢量文件导出器
//!
//! 逐图层递归遍历顶层单元中的图形并交给 [`VectorPainter`] 绘制：
//!
//! 1. 背景（仅彩色模式）
//! 2. 每个图层：按颜色模式设置画笔，绘制轮廓、可选的点阵填充和文本
//! 3. 逐页输出时，在下一个有图形的图层之前开始新页
//!
//! 每处理一个图形检查一次取消请求，每完成一个图层报告一次进度。

use crate::design_info::DesignInfo;
use crate::error::ExportError;
use crate::painter::{create_painter, FontMetrics, Pen, StippleFill, VectorPainter};
use crate::progress::ProgressReporter;
use crate::settings::{ColorMode, GeometryReduction, LayerOutputStyle, TextMode, VectorFileExportSettings};
use crate::stipple_cache::StippleCache;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use vfe_core::geometry::{HAlign, Shape, Text, VAlign};
use vfe_core::layer::{LayerIndex, LayerProperties};
use vfe_core::layout::ShapeRef;
use vfe_core::math::{BoundingBox2, Point2};
use vfe_core::properties::Color;
use vfe_core::stipple::Stipple;
use vfe_core::transform::Transform2D;
use vfe_core::view::LayoutView;

/// 每个点阵像素在输出中的边长（点）
pub const STIPPLE_PIXEL_PT: f64 = 1.0;

/// 导出统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub pages: usize,
    pub layers: usize,
    pub shapes: usize,
    /// 因小于最小可见尺寸而省略的图形
    pub omitted: usize,
}

/// 导出器
pub struct VectorFileExporter<'v> {
    view: &'v dyn LayoutView,
    settings: VectorFileExportSettings,
    design_info: DesignInfo,
    stipple_cache: StippleCache,
    metrics: FontMetrics,
}

impl<'v> VectorFileExporter<'v> {
    /// 按设置中的图层选择创建
    pub fn new(view: &'v dyn LayoutView, settings: VectorFileExportSettings) -> Result<Self, ExportError> {
        let design_info = DesignInfo::for_layout_view(view, &settings)?;
        Ok(Self::with_design_info(view, settings, design_info))
    }

    pub fn with_design_info(view: &'v dyn LayoutView, settings: VectorFileExportSettings, design_info: DesignInfo) -> Self {
        Self {
            view,
            settings,
            design_info,
            stipple_cache: StippleCache::new(),
            metrics: FontMetrics::default(),
        }
    }

    pub fn with_stipple_cache(mut self, cache: StippleCache) -> Self {
        self.stipple_cache = cache;
        self
    }

    pub fn design_info(&self) -> &DesignInfo {
        &self.design_info
    }

    pub fn settings(&self) -> &VectorFileExportSettings {
        &self.settings
    }

    /// 导出到 `settings.output_path`
    pub fn export(&mut self, progress: Option<&mut dyn ProgressReporter>) -> Result<ExportSummary, ExportError> {
        let path = self.settings.output_path.clone();
        self.export_to_path(&path, progress)
    }

    /// 导出到指定文件；只有绘制成功后才会创建文件
    pub fn export_to_path(&mut self, path: &Path, progress: Option<&mut dyn ProgressReporter>) -> Result<ExportSummary, ExportError> {
        let mut buffer = Vec::new();
        let summary = self.render_to(&mut buffer, progress)?;
        std::fs::write(path, &buffer)?;
        tracing::info!(
            "Exported {} ({} layers, {} shapes, {} pages) to {}",
            self.settings.file_format.name(),
            summary.layers,
            summary.shapes,
            summary.pages,
            path.display()
        );
        Ok(summary)
    }

    /// 绘制并把完整的文件内容写入 `out`
    pub fn render_to(&mut self, out: &mut dyn Write, mut progress: Option<&mut dyn ProgressReporter>) -> Result<ExportSummary, ExportError> {
        let mut painter = create_painter(&self.settings, &self.design_info);
        let summary = self.paint_layers(painter.as_mut(), &mut progress)?;
        let bytes = painter.finish()?;
        out.write_all(&bytes)?;
        Ok(summary)
    }

    /// 版图坐标 (µm) 到设备坐标 (pt) 的变换
    ///
    /// PDF 中图形在页面上居中；SVG 的画布就是图形本身。
    pub fn device_transform(&self, page_size: (f64, f64)) -> Transform2D {
        let di = &self.design_info;
        let s = di.scale_um_to_pt();
        let offset_x = (page_size.0 - di.fig_width_pt()) / 2.0;
        let offset_y = (page_size.1 - di.fig_height_pt()) / 2.0;
        Transform2D::translation(offset_x - di.bbox.min.x * s, offset_y + di.bbox.max.y * s)
            .then(&Transform2D::scale(s, -s))
    }

    fn font_size_pt(&self) -> f64 {
        self.settings.effective_font_size_pt(self.design_info.fig_width_pt())
    }

    fn pen_for(&self, lp: Option<&LayerProperties>, width: f64) -> Pen {
        let color = match (self.settings.color_mode, lp) {
            (ColorMode::BlackAndWhite, _) | (_, None) => Color::BLACK,
            (ColorMode::Greyscale, Some(lp)) => lp.frame_color.to_greyscale(),
            (ColorMode::Color, Some(lp)) => lp.frame_color,
        };
        Pen::new(color, width)
    }

    fn fill_color_for(&self, lp: Option<&LayerProperties>) -> Color {
        match (self.settings.color_mode, lp) {
            (ColorMode::BlackAndWhite, _) | (_, None) => Color::BLACK,
            (ColorMode::Greyscale, Some(lp)) => lp.fill_color.to_greyscale(),
            (ColorMode::Color, Some(lp)) => lp.fill_color,
        }
    }

    fn draw_background(&self, painter: &mut dyn VectorPainter) {
        if !self.settings.include_background_color {
            return;
        }
        match self.settings.color_mode {
            // 黑白和灰度模式下不画背景，避免对比度问题
            ColorMode::BlackAndWhite | ColorMode::Greyscale => {}
            ColorMode::Color => {
                let (w, h) = painter.page_size();
                painter.fill_rect(0.0, 0.0, w, h, self.view.background_color());
            }
        }
    }

    fn is_valid_text(&self, layer: LayerIndex, shape: &ShapeRef<'_>) -> bool {
        match self.settings.text_mode {
            TextMode::None => return false,
            TextMode::AllVisible => {}
            TextMode::OnlyTopCell => {
                if Some(shape.cell) != self.design_info.cell {
                    return false;
                }
            }
        }
        if self.settings.text_layers_filter_enabled {
            return self.design_info.text_filter_layer_indexes.contains(&layer);
        }
        true
    }

    fn layer_stipple(&self, lp: Option<&LayerProperties>) -> Option<Stipple> {
        if !self.settings.include_stipples {
            return None;
        }
        let source = lp?.stipple.as_deref()?;
        match Stipple::parse(source) {
            Ok(stipple) if !stipple.is_blank() => Some(stipple),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Ignoring invalid stipple of layer {}: {}", lp.map(|l| l.display_name()).unwrap_or_default(), e);
                None
            }
        }
    }

    fn paint_layers(
        &mut self,
        painter: &mut dyn VectorPainter,
        progress: &mut Option<&mut dyn ProgressReporter>,
    ) -> Result<ExportSummary, ExportError> {
        let Some(top_cell) = self.design_info.cell else {
            return Err(ExportError::render("no top cell to export"));
        };
        let view = self.view;
        let layout = view.layout();
        let device = self.device_transform(painter.page_size());
        let pen_width = self.design_info.dbu * self.design_info.scale_um_to_pt();
        let font_size = self.font_size_pt();
        let min_feature = self.design_info.min_feature_size_um();
        let min_depth = view.min_hier_levels().saturating_sub(1);
        let max_depth = view.max_hier_levels().saturating_sub(1);

        let properties: HashMap<LayerIndex, &LayerProperties> = view
            .layers()
            .iter()
            .rev()
            .filter_map(|lp| lp.layer_index.map(|idx| (idx, lp)))
            .collect();

        let layer_indexes = self.design_info.layer_indexes.clone();
        let num_layers = layer_indexes.len();
        if let Some(p) = progress.as_deref_mut() {
            p.begin_progress(num_layers);
        }

        tracing::debug!(
            "VectorFileExporter: {} layers, figure {:.3} x {:.3} mm, depth {}..={}",
            num_layers,
            self.design_info.fig_width_mm(),
            self.design_info.fig_height_mm(),
            min_depth,
            max_depth
        );

        self.draw_background(painter);

        let mut summary = ExportSummary::default();
        let mut new_page_needed = false;

        for (i, layer) in layer_indexes.iter().copied().enumerate() {
            let lp = properties.get(&layer).copied();
            let pen = self.pen_for(lp, pen_width);
            let fill_color = self.fill_color_for(lp);
            let stipple = self.layer_stipple(lp);
            let layer_name = match lp {
                Some(lp) => lp.display_name(),
                None => layout.layer_info(layer).map(|l| l.to_string()).unwrap_or_else(|| layer.to_string()),
            };

            painter.begin_layer(&layer_name);
            let mut found_shapes_on_layer = false;

            for shape_ref in layout.shapes_rec(top_cell, layer, min_depth, max_depth) {
                let drawable = !shape_ref.shape.is_text() || self.is_valid_text(layer, &shape_ref);
                if drawable {
                    if new_page_needed {
                        painter.end_layer();
                        painter.new_page();
                        self.draw_background(painter);
                        painter.begin_layer(&layer_name);
                        new_page_needed = false;
                    }

                    let drawn = match shape_ref.shape {
                        Shape::Text(text) => {
                            self.draw_text(painter, &device, &shape_ref.trans, text, pen.color, font_size);
                            true
                        }
                        shape => {
                            let world = shape_ref.trans;
                            match shape.transformed_hull(&world) {
                                Some(hull) if !hull.is_empty() => {
                                    let bbox = BoundingBox2::from_points(hull.iter().copied());
                                    if self.settings.geometry_reduction == GeometryReduction::OmitSmallPolygons
                                        && (bbox.width() < min_feature || bbox.height() < min_feature)
                                    {
                                        summary.omitted += 1;
                                        false
                                    } else {
                                        let points: Vec<Point2> = hull.iter().map(|p| device.transform_point(p)).collect();
                                        if let Some(stipple) = &stipple {
                                            self.draw_stipple(painter, &points, stipple, fill_color)?;
                                        }
                                        painter.draw_polygon(&points, &pen);
                                        true
                                    }
                                }
                                _ => false,
                            }
                        }
                    };
                    if drawn {
                        summary.shapes += 1;
                        found_shapes_on_layer = true;
                    }
                }

                if let Some(p) = progress.as_deref() {
                    if p.was_canceled() {
                        tracing::debug!("VectorFileExporter: cancelled on layer {}", layer_name);
                        return Err(ExportError::Cancelled);
                    }
                }
            }

            painter.end_layer();
            summary.layers += 1;
            if let Some(p) = progress.as_deref_mut() {
                p.progress(num_layers, i + 1);
            }

            new_page_needed = found_shapes_on_layer && self.settings.layer_output_style == LayerOutputStyle::PagePerLayer;
        }

        summary.pages = painter.page_count();
        Ok(summary)
    }

    fn draw_text(
        &self,
        painter: &mut dyn VectorPainter,
        device: &Transform2D,
        trans: &Transform2D,
        text: &Text,
        color: Color,
        default_size: f64,
    ) {
        let font_size = match text.size {
            Some(size_um) => size_um * self.design_info.scale_um_to_pt(),
            None => default_size,
        };
        let anchor = device.transform_point(&trans.transform_point(&text.position));
        let width = self.metrics.text_width(&text.string, font_size);
        let ascent = self.metrics.ascent * font_size;
        let descent = self.metrics.descent * font_size;

        let x = match text.halign {
            HAlign::Left => anchor.x,
            HAlign::Center => anchor.x - width / 2.0,
            HAlign::Right => anchor.x - width,
        };
        // 设备坐标 y 向下，基线相对锚点的位置
        let y = match text.valign {
            VAlign::Top => anchor.y + ascent,
            VAlign::Center => anchor.y + (ascent - descent) / 2.0,
            VAlign::Bottom => anchor.y - descent,
        };
        painter.draw_text(Point2::new(x, y), &text.string, font_size, color);
    }

    fn draw_stipple(
        &mut self,
        painter: &mut dyn VectorPainter,
        points: &[Point2],
        stipple: &Stipple,
        color: Color,
    ) -> Result<(), ExportError> {
        let bbox = BoundingBox2::from_points(points.iter().copied());
        let px = STIPPLE_PIXEL_PT;
        let tile_w = stipple.bitmap().width() as f64 * px;
        let tile_h = stipple.bitmap().height() as f64 * px;
        if tile_w <= 0.0 || tile_h <= 0.0 || bbox.is_empty() {
            return Ok(());
        }

        // 拼版原点对齐到图案网格，相邻图形的图案连续
        let origin = Point2::new((bbox.min.x / tile_w).floor() * tile_w, (bbox.min.y / tile_h).floor() * tile_h);
        let min_w = ((bbox.max.x - origin.x) / px).ceil().max(1.0) as usize;
        let min_h = ((bbox.max.y - origin.y) / px).ceil().max(1.0) as usize;

        let panel = self
            .stipple_cache
            .panelize(stipple, min_w, min_h)
            .map_err(|e| ExportError::render(format!("stipple: {e}")))?;
        painter.fill_stipple(
            points,
            &StippleFill {
                origin,
                pixel_size: px,
                rects: &panel.rects,
                color,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::VectorFileFormat;
    use vfe_core::layer::LayerInfo;
    use vfe_core::view::MemoryView;

    struct CancelAfter {
        polls: std::cell::Cell<usize>,
        limit: usize,
        layers_done: usize,
    }

    impl ProgressReporter for CancelAfter {
        fn begin_progress(&mut self, _total_layers: usize) {}

        fn progress(&mut self, _total_layers: usize, exported_layers: usize) {
            self.layers_done = exported_layers;
        }

        fn was_canceled(&self) -> bool {
            self.polls.set(self.polls.get() + 1);
            self.polls.get() > self.limit
        }
    }

    fn render(view: &MemoryView, settings: VectorFileExportSettings) -> (String, ExportSummary) {
        let mut exporter = VectorFileExporter::new(view, settings).unwrap();
        let mut out = Vec::new();
        let summary = exporter.render_to(&mut out, None).unwrap();
        (String::from_utf8_lossy(&out).into_owned(), summary)
    }

    #[test]
    fn test_svg_export_draws_all_visible_layers() {
        let view = MemoryView::demo();
        let settings = VectorFileExportSettings {
            file_format: VectorFileFormat::Svg,
            ..Default::default()
        };
        let (svg, summary) = render(&view, settings);

        assert!(svg.contains("<svg"));
        assert_eq!(summary.layers, view.layers.len());
        assert_eq!(summary.pages, 1);
        assert_eq!(svg.matches("class=\"layer\"").count(), view.layers.len());
        // 文本 "Y" 在两个实例中各一次，"OUT" 在顶层
        assert_eq!(svg.matches(">Y</text>").count(), 2);
        assert_eq!(svg.matches(">OUT</text>").count(), 1);
        // 黑白模式
        assert!(!svg.contains("stroke=\"#0000ff\""));
    }

    #[test]
    fn test_color_mode_and_background() {
        let view = MemoryView::demo();
        let (svg, _) = render(
            &view,
            VectorFileExportSettings {
                file_format: VectorFileFormat::Svg,
                color_mode: ColorMode::Color,
                ..Default::default()
            },
        );
        assert!(svg.contains("stroke=\"#0000ff\""));
        assert!(svg.contains("fill=\"#ffffff\" stroke=\"none\""));

        let (grey, _) = render(
            &view,
            VectorFileExportSettings {
                file_format: VectorFileFormat::Svg,
                color_mode: ColorMode::Greyscale,
                ..Default::default()
            },
        );
        // 蓝色 (0,0,255) 的亮度为 29
        assert!(grey.contains("stroke=\"#1d1d1d\""));
        assert!(!grey.contains("fill=\"#ffffff\" stroke=\"none\""));
    }

    #[test]
    fn test_text_modes() {
        let view = MemoryView::demo();
        let svg_settings = |text_mode| VectorFileExportSettings {
            file_format: VectorFileFormat::Svg,
            text_mode,
            ..Default::default()
        };

        let (none, _) = render(&view, svg_settings(TextMode::None));
        assert!(!none.contains("<text"));

        let (top_only, _) = render(&view, svg_settings(TextMode::OnlyTopCell));
        assert_eq!(top_only.matches("<text").count(), 1);

        let mut filtered = svg_settings(TextMode::AllVisible);
        filtered.text_layers_filter_enabled = true;
        filtered.text_layers = "metal2".into();
        let (filtered, _) = render(&view, filtered);
        assert!(!filtered.contains("<text"));
    }

    #[test]
    fn test_page_per_layer() {
        let view = MemoryView::demo();
        let single = render(&view, VectorFileExportSettings::default()).1;
        assert_eq!(single.pages, 1);

        let settings = VectorFileExportSettings {
            layer_output_style: LayerOutputStyle::PagePerLayer,
            ..Default::default()
        };
        let (pdf, summary) = render(&view, settings);
        assert!(pdf.starts_with("%PDF-"));
        assert_eq!(summary.pages, view.layers.len());
        assert!(pdf.contains(&format!("/Count {}", view.layers.len())));
    }

    #[test]
    fn test_small_polygons_are_omitted() {
        let mut view = MemoryView::demo();
        let via1 = view.layout.find_layer(&LayerInfo::named("via1")).unwrap();
        let top = view.top_cell().unwrap();
        view.layout
            .insert_shape(top, via1, Shape::Box(BoundingBox2::from_ltrb(0.0, 0.0, 0.001, 0.001)))
            .unwrap();

        let (_, reduced) = render(&view, VectorFileExportSettings::default());
        assert_eq!(reduced.omitted, 1);

        let (_, full) = render(
            &view,
            VectorFileExportSettings {
                geometry_reduction: GeometryReduction::None,
                ..Default::default()
            },
        );
        assert_eq!(full.omitted, 0);
        assert_eq!(full.shapes, reduced.shapes + 1);
    }

    #[test]
    fn test_stipples() {
        let view = MemoryView::demo();
        let (svg, _) = render(
            &view,
            VectorFileExportSettings {
                file_format: VectorFileFormat::Svg,
                include_stipples: true,
                ..Default::default()
            },
        );
        assert!(svg.contains("<clipPath"));

        let (plain, _) = render(
            &view,
            VectorFileExportSettings {
                file_format: VectorFileFormat::Svg,
                ..Default::default()
            },
        );
        assert!(!plain.contains("<clipPath"));
    }

    #[test]
    fn test_oversized_stipple_panel_is_render_error() {
        let view = MemoryView::demo();
        let mut exporter = VectorFileExporter::new(
            &view,
            VectorFileExportSettings {
                file_format: VectorFileFormat::Svg,
                include_stipples: true,
                content_scaling_value: 1_200_000.0,
                ..Default::default()
            },
        )
        .unwrap();

        let mut out = Vec::new();
        let err = exporter.render_to(&mut out, None).unwrap_err();
        assert!(matches!(err, ExportError::RenderFailed(ref msg) if msg.contains("too large")), "{err}");
        assert!(out.is_empty());
    }

    #[test]
    fn test_device_transform_centers_and_flips() {
        let view = MemoryView::demo();
        let exporter = VectorFileExporter::new(&view, VectorFileExportSettings::default()).unwrap();
        let di = exporter.design_info().clone();
        let page = (595.0, 842.0);
        let t = exporter.device_transform(page);

        let top_left = t.transform_point(&Point2::new(di.bbox.min.x, di.bbox.max.y));
        let bottom_right = t.transform_point(&Point2::new(di.bbox.max.x, di.bbox.min.y));
        assert!((top_left.x - (page.0 - di.fig_width_pt()) / 2.0).abs() < 1e-9);
        assert!((top_left.y - (page.1 - di.fig_height_pt()) / 2.0).abs() < 1e-9);
        assert!((bottom_right.x - top_left.x - di.fig_width_pt()).abs() < 1e-9);
        assert!((bottom_right.y - top_left.y - di.fig_height_pt()).abs() < 1e-9);
    }

    #[test]
    fn test_cancellation_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let view = MemoryView::demo();
        let mut exporter = VectorFileExporter::new(&view, VectorFileExportSettings::default()).unwrap();
        let mut reporter = CancelAfter {
            polls: std::cell::Cell::new(0),
            limit: 3,
            layers_done: 0,
        };

        let err = exporter.export_to_path(&path, Some(&mut reporter)).unwrap_err();
        assert!(err.is_cancelled());
        assert!(!path.exists());
        assert!(reporter.layers_done < view.layers.len());
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let view = MemoryView::demo();
        let settings = VectorFileExportSettings {
            output_path: path.clone(),
            ..Default::default()
        };
        let mut exporter = VectorFileExporter::new(&view, settings).unwrap();
        let summary = exporter.export(None).unwrap();

        assert!(summary.shapes > 0);
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }
}
