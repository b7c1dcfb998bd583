//! 导出表单
//!
//! 对话框编辑的原始输入：缩放系数文本、输出路径文本、图层勾选列表，
//! 以及其余导出设置。校验在控制器中进行。

use std::path::{Path, PathBuf};
use vfe_core::layer::LayerIndex;
use vfe_core::math::BoundingBox2;
use vfe_core::view::LayoutView;
use vfe_file::design_info::DesignInfo;
use vfe_file::page::MM_PER_INCH;
use vfe_file::settings::{ContentScaling, VectorFileExportSettings, VectorFileFormat};

/// 缩放系数的初始值
pub const DEFAULT_SCALE_TEXT: &str = "1.0";

/// 图层勾选项
#[derive(Debug, Clone, PartialEq)]
pub struct LayerToggle {
    pub index: LayerIndex,
    /// 显示名称
    pub name: String,
    /// 源图层名称
    pub layer_name: Option<String>,
    pub checked: bool,
}

impl LayerToggle {
    /// 按显示名称或源图层名称匹配
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.layer_name.as_deref() == Some(name)
    }
}

/// 导出表单
#[derive(Debug, Clone, PartialEq)]
pub struct ExportForm {
    pub scale_text: String,
    pub path_text: String,
    pub layers: Vec<LayerToggle>,
    pub settings: VectorFileExportSettings,
}

impl ExportForm {
    /// 从视图和已保存的设置创建
    ///
    /// 勾选状态来自视图中图层的可见性；设置为自定义图层列表时按列表勾选。
    pub fn new(view: &dyn LayoutView, settings: VectorFileExportSettings) -> Self {
        let selected = DesignInfo::selected_layers(view, &settings);
        let mut layers: Vec<LayerToggle> = Vec::new();
        for lp in view.layers() {
            let Some(index) = lp.layer_index else {
                continue;
            };
            if layers.iter().any(|t| t.index == index) {
                continue;
            }
            layers.push(LayerToggle {
                index,
                name: lp.display_name(),
                layer_name: lp.source.name.clone(),
                checked: selected.contains(&index),
            });
        }

        let path_text = default_output_path(view, &settings).display().to_string();
        Self {
            scale_text: DEFAULT_SCALE_TEXT.to_string(),
            path_text,
            layers,
            settings,
        }
    }

    /// 设置勾选状态；没有该图层时返回 `false`
    pub fn set_layer_checked(&mut self, name: &str, checked: bool) -> bool {
        match self.layers.iter_mut().find(|t| t.matches(name)) {
            Some(toggle) => {
                toggle.checked = checked;
                true
            }
            None => false,
        }
    }

    pub fn check_all(&mut self, checked: bool) {
        for toggle in &mut self.layers {
            toggle.checked = checked;
        }
    }

    /// 只勾选给定名称的图层
    pub fn check_only(&mut self, names: &[&str]) {
        for toggle in &mut self.layers {
            toggle.checked = names.iter().any(|n| toggle.matches(n));
        }
    }

    pub fn checked_indexes(&self) -> Vec<LayerIndex> {
        self.layers.iter().filter(|t| t.checked).map(|t| t.index).collect()
    }

    pub fn checked_count(&self) -> usize {
        self.layers.iter().filter(|t| t.checked).count()
    }

    /// 切换输出格式，同时替换路径的扩展名
    pub fn set_format(&mut self, format: VectorFileFormat) {
        self.settings.file_format = format;
        let path = PathBuf::from(self.path_text.trim());
        if path.as_os_str().is_empty() {
            return;
        }
        self.path_text = path.with_extension(format.extension()).display().to_string();
    }

    /// 路径文本变化后，扩展名为已知格式时同步格式
    pub fn sync_format_from_path(&mut self) {
        if let Some(format) = VectorFileFormat::from_path(Path::new(self.path_text.trim())) {
            self.settings.file_format = format;
        }
    }

    /// 当前缩放系数；文本无效时为 `None`
    pub fn scale(&self) -> Option<f64> {
        self.scale_text.trim().parse::<f64>().ok().filter(|s| s.is_finite() && *s > 0.0)
    }

    /// 不含缩放系数的图形尺寸（毫米）
    pub fn figure_size_mm(&self, bbox: &BoundingBox2) -> (f64, f64) {
        let width_um = bbox.width();
        if width_um <= 0.0 {
            return (0.0, 0.0);
        }
        let width_mm = self.settings.fig_width_inch(width_um) * MM_PER_INCH;
        (width_mm, width_mm / width_um * bbox.height())
    }

    /// 修改图形宽度（毫米）
    pub fn set_figure_width_mm(&mut self, width_mm: f64, bbox: &BoundingBox2) {
        let width_um = bbox.width();
        if width_um <= 0.0 || width_mm <= 0.0 {
            return;
        }
        self.settings.content_scaling_value = match self.settings.content_scaling_style {
            ContentScaling::FigureWidthMm => width_mm,
            ContentScaling::Scaling => width_mm / width_um * 1e3,
        };
    }

    /// 修改图形高度（毫米），宽度按版图宽高比换算
    pub fn set_figure_height_mm(&mut self, height_mm: f64, bbox: &BoundingBox2) {
        let height_um = bbox.height();
        if height_um <= 0.0 {
            return;
        }
        let width_mm = bbox.width() / height_um * height_mm;
        self.set_figure_width_mm(width_mm, bbox);
    }

    /// 切换内容缩放方式并换算当前值
    pub fn set_scaling_style(&mut self, style: ContentScaling, bbox: &BoundingBox2) {
        let value = self.settings.convert_scaling_value(bbox.width(), style);
        self.settings.content_scaling_style = style;
        self.settings.content_scaling_value = value;
    }
}

/// 默认输出文件：`<顶层单元名>_export.<扩展名>`，放在上次导出的目录中
pub fn default_output_path(view: &dyn LayoutView, settings: &VectorFileExportSettings) -> PathBuf {
    let cell_name = view
        .top_cell()
        .and_then(|c| view.layout().cell(c))
        .map(|c| c.name.clone())
        .unwrap_or_else(|| view.title().to_string());
    let file_name = format!("{}_export.{}", cell_name, settings.file_format.extension());

    match settings.output_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && dir.is_dir() => dir.join(file_name),
        _ => PathBuf::from(file_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfe_core::view::MemoryView;
    use vfe_file::settings::LayerSelectionMode;

    fn bbox() -> BoundingBox2 {
        BoundingBox2::from_ltrb(0.0, 0.0, 12.7, 6.96)
    }

    #[test]
    fn test_seeded_from_visibility() {
        let mut view = MemoryView::demo();
        view.layers[3].visible = false;
        let form = ExportForm::new(&view, VectorFileExportSettings::default());

        assert_eq!(form.scale_text, "1.0");
        assert_eq!(form.path_text, "TOP_export.pdf");
        assert_eq!(form.layers.len(), 6);
        assert_eq!(form.checked_count(), 5);
        assert!(!form.layers[3].checked);
        assert_eq!(form.layers[2].name, "metal1 (8/0)");
    }

    #[test]
    fn test_seeded_from_custom_list() {
        let view = MemoryView::demo();
        let settings = VectorFileExportSettings {
            layer_selection_mode: LayerSelectionMode::CustomLayerList,
            custom_layers: "metal1, 10/0".into(),
            ..Default::default()
        };
        let form = ExportForm::new(&view, settings);
        let names: Vec<&str> = form.layers.iter().filter(|t| t.checked).map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["metal1 (8/0)", "metal2 (10/0)"]);
    }

    #[test]
    fn test_default_path_uses_last_directory() {
        let dir = tempfile::tempdir().unwrap();
        let view = MemoryView::demo();
        let settings = VectorFileExportSettings {
            file_format: VectorFileFormat::Svg,
            output_path: dir.path().join("old.svg"),
            ..Default::default()
        };
        assert_eq!(default_output_path(&view, &settings), dir.path().join("TOP_export.svg"));
    }

    #[test]
    fn test_format_switch_replaces_suffix() {
        let view = MemoryView::demo();
        let mut form = ExportForm::new(&view, VectorFileExportSettings::default());
        form.path_text = "out/chip.pdf".into();
        form.set_format(VectorFileFormat::Svg);
        assert_eq!(form.path_text, "out/chip.svg");
        assert_eq!(form.settings.file_format, VectorFileFormat::Svg);

        form.path_text = "chip.pdf".into();
        form.sync_format_from_path();
        assert_eq!(form.settings.file_format, VectorFileFormat::Pdf);
    }

    #[test]
    fn test_figure_size_sync() {
        let view = MemoryView::demo();
        let mut form = ExportForm::new(&view, VectorFileExportSettings::default());
        let bbox = bbox();

        form.set_figure_width_mm(127.0, &bbox);
        let (w, h) = form.figure_size_mm(&bbox);
        assert!((w - 127.0).abs() < 1e-9);
        assert!((h - 69.6).abs() < 1e-9);

        form.set_figure_height_mm(34.8, &bbox);
        assert!((form.settings.content_scaling_value - 63.5).abs() < 1e-9);

        form.set_figure_width_mm(127.0, &bbox);
        form.set_scaling_style(ContentScaling::Scaling, &bbox);
        assert!((form.settings.content_scaling_value - 10000.0).abs() < 1e-6);
        form.set_figure_width_mm(63.5, &bbox);
        assert!((form.settings.content_scaling_value - 5000.0).abs() < 1e-6);
    }

    #[test]
    fn test_scale_parsing() {
        let view = MemoryView::demo();
        let mut form = ExportForm::new(&view, VectorFileExportSettings::default());
        assert_eq!(form.scale(), Some(1.0));
        form.scale_text = " 2.5 ".into();
        assert_eq!(form.scale(), Some(2.5));
        form.scale_text = "-1".into();
        assert_eq!(form.scale(), None);
        form.scale_text = "abc".into();
        assert_eq!(form.scale(), None);
    }
}
