//! 导出设置
//!
//! 设置以 JSON 保存在用户配置目录下：
//!
//! ```text
//! <config_dir>/vector-file-export/settings.json
//! ```
//!
//! 环境变量 `VFE_CONFIG_DIR` 可以替换 `<config_dir>/vector-file-export`。
//! 只有真正执行导出时才会写入设置。

use crate::error::SettingsError;
use crate::page::{PageFormat, PageOrientation, MM_PER_INCH, PT_PER_INCH};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 配置目录环境变量
pub const CONFIG_DIR_ENV: &str = "VFE_CONFIG_DIR";

/// 输出文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VectorFileFormat {
    #[default]
    #[serde(rename = ".pdf")]
    Pdf,
    #[serde(rename = ".svg")]
    Svg,
}

impl VectorFileFormat {
    pub const ALL: [VectorFileFormat; 2] = [VectorFileFormat::Pdf, VectorFileFormat::Svg];

    /// 文件扩展名（不含点）
    pub fn extension(&self) -> &'static str {
        match self {
            VectorFileFormat::Pdf => "pdf",
            VectorFileFormat::Svg => "svg",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VectorFileFormat::Pdf => "PDF",
            VectorFileFormat::Svg => "SVG",
        }
    }

    /// 根据扩展名判断格式
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::ALL.into_iter().find(|f| f.extension() == ext)
    }

    /// 没有扩展名时追加与格式对应的扩展名
    pub fn with_extension(&self, path: &Path) -> PathBuf {
        if path.extension().is_some() {
            path.to_path_buf()
        } else {
            path.with_extension(self.extension())
        }
    }
}

/// 图层输出方式（仅 PDF）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayerOutputStyle {
    #[default]
    SinglePage,
    PagePerLayer,
}

/// 内容缩放方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentScaling {
    /// 按图形宽度（毫米）
    #[default]
    FigureWidthMm,
    /// 按比例（1 µm 对应 `value / 1000` 毫米）
    Scaling,
}

/// 颜色模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ColorMode {
    #[default]
    #[serde(rename = "Black & White")]
    BlackAndWhite,
    #[serde(rename = "Greyscale")]
    Greyscale,
    #[serde(rename = "Color")]
    Color,
}

impl ColorMode {
    pub const ALL: [ColorMode; 3] = [ColorMode::BlackAndWhite, ColorMode::Greyscale, ColorMode::Color];

    pub fn name(&self) -> &'static str {
        match self {
            ColorMode::BlackAndWhite => "Black & White",
            ColorMode::Greyscale => "Greyscale",
            ColorMode::Color => "Color",
        }
    }
}

/// 字号方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FontSizeMode {
    Absolute,
    #[default]
    PercentOfFigWidth,
}

/// 文本输出方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextMode {
    None,
    #[default]
    AllVisible,
    OnlyTopCell,
}

/// 几何简化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GeometryReduction {
    None,
    #[default]
    OmitSmallPolygons,
}

/// 图层选择方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayerSelectionMode {
    #[default]
    AllVisibleLayers,
    CustomLayerList,
}

/// 导出设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorFileExportSettings {
    pub file_format: VectorFileFormat,
    pub output_path: PathBuf,
    pub title: String,
    pub page_format: PageFormat,
    pub page_orientation: PageOrientation,
    pub content_scaling_style: ContentScaling,
    pub content_scaling_value: f64,
    pub color_mode: ColorMode,
    pub include_background_color: bool,
    /// 使用图层的点阵图案填充图形
    pub include_stipples: bool,
    pub font_family: String,
    pub font_size_mode: FontSizeMode,
    pub font_size_pt: f64,
    pub font_size_percent_of_fig_width: f64,
    pub text_mode: TextMode,
    pub text_layers_filter_enabled: bool,
    /// 文本图层过滤列表（图层列表格式）
    pub text_layers: String,
    pub geometry_reduction: GeometryReduction,
    pub layer_output_style: LayerOutputStyle,
    pub layer_selection_mode: LayerSelectionMode,
    /// 仅在 [`LayerSelectionMode::CustomLayerList`] 下使用
    pub custom_layers: String,
}

impl Default for VectorFileExportSettings {
    fn default() -> Self {
        Self {
            file_format: VectorFileFormat::Pdf,
            output_path: PathBuf::new(),
            title: "Vector File Export".to_string(),
            page_format: PageFormat::A4,
            page_orientation: PageOrientation::Portrait,
            content_scaling_style: ContentScaling::FigureWidthMm,
            content_scaling_value: 120.0,
            color_mode: ColorMode::BlackAndWhite,
            include_background_color: true,
            include_stipples: false,
            font_family: "monospace".to_string(),
            font_size_mode: FontSizeMode::PercentOfFigWidth,
            font_size_pt: 6.0,
            font_size_percent_of_fig_width: 1.0,
            text_mode: TextMode::AllVisible,
            text_layers_filter_enabled: false,
            text_layers: String::new(),
            geometry_reduction: GeometryReduction::OmitSmallPolygons,
            layer_output_style: LayerOutputStyle::SinglePage,
            layer_selection_mode: LayerSelectionMode::AllVisibleLayers,
            custom_layers: String::new(),
        }
    }
}

impl VectorFileExportSettings {
    /// 图形宽度（英寸）
    pub fn fig_width_inch(&self, width_um: f64) -> f64 {
        match self.content_scaling_style {
            ContentScaling::FigureWidthMm => self.content_scaling_value / MM_PER_INCH,
            ContentScaling::Scaling => width_um * self.content_scaling_value / 1e3 / MM_PER_INCH,
        }
    }

    /// 实际字号（点）
    pub fn effective_font_size_pt(&self, fig_width_pt: f64) -> f64 {
        match self.font_size_mode {
            FontSizeMode::Absolute => self.font_size_pt,
            FontSizeMode::PercentOfFigWidth => fig_width_pt * self.font_size_percent_of_fig_width * 0.01,
        }
    }

    /// 按方向调整后的页面尺寸（点）
    pub fn page_size_pt(&self) -> (f64, f64) {
        self.page_orientation.apply(self.page_format.dimensions_pt())
    }

    /// 把内容缩放值换算到另一种缩放方式（对话框切换缩放方式时使用）
    pub fn convert_scaling_value(&self, width_um: f64, target: ContentScaling) -> f64 {
        if target == self.content_scaling_style || width_um <= 0.0 {
            return self.content_scaling_value;
        }
        let fig_width_mm = self.fig_width_inch(width_um) * MM_PER_INCH;
        match target {
            ContentScaling::FigureWidthMm => fig_width_mm,
            ContentScaling::Scaling => fig_width_mm / width_um * 1e3,
        }
    }

    /// 图形宽度（点），供字号等计算
    pub fn fig_width_pt(&self, width_um: f64) -> f64 {
        self.fig_width_inch(width_um) * PT_PER_INCH
    }
}

/// 设置存储
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 默认位置：`$VFE_CONFIG_DIR/settings.json` 或 `<config_dir>/vector-file-export/settings.json`
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir).join("settings.json"));
        }
        let config_dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(config_dir.join("vector-file-export").join("settings.json"))
    }

    pub fn open_default() -> Result<Self, SettingsError> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取设置；文件不存在时返回默认设置
    pub fn load(&self) -> Result<VectorFileExportSettings, SettingsError> {
        if !self.path.exists() {
            tracing::debug!("SettingsStore::load: {} not found, using defaults", self.path.display());
            return Ok(VectorFileExportSettings::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// 读取设置；失败时记录警告并返回默认设置
    pub fn load_or_default(&self) -> VectorFileExportSettings {
        match self.load() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Error loading export settings from {}: {}; using defaults", self.path.display(), e);
                VectorFileExportSettings::default()
            }
        }
    }

    pub fn save(&self, settings: &VectorFileExportSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json)?;
        tracing::debug!("SettingsStore::save: wrote {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = VectorFileExportSettings::default();
        assert_eq!(s.file_format, VectorFileFormat::Pdf);
        assert_eq!(s.page_format, PageFormat::A4);
        assert_eq!(s.content_scaling_style, ContentScaling::FigureWidthMm);
        assert_eq!(s.content_scaling_value, 120.0);
        assert_eq!(s.color_mode, ColorMode::BlackAndWhite);
        assert_eq!(s.font_family, "monospace");
        assert_eq!(s.geometry_reduction, GeometryReduction::OmitSmallPolygons);
    }

    #[test]
    fn test_enum_serialization_names() {
        let json = serde_json::to_value(VectorFileExportSettings::default()).unwrap();
        assert_eq!(json["file_format"], ".pdf");
        assert_eq!(json["color_mode"], "Black & White");
        assert_eq!(json["content_scaling_style"], "figure_width_mm");
        assert_eq!(json["layer_selection_mode"], "all_visible_layers");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: VectorFileExportSettings =
            serde_json::from_str(r#"{ "file_format": ".svg", "color_mode": "Color" }"#).unwrap();
        assert_eq!(s.file_format, VectorFileFormat::Svg);
        assert_eq!(s.color_mode, ColorMode::Color);
        assert_eq!(s.content_scaling_value, 120.0);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(VectorFileFormat::from_path(Path::new("a/out.SVG")), Some(VectorFileFormat::Svg));
        assert_eq!(VectorFileFormat::from_path(Path::new("out.pdf")), Some(VectorFileFormat::Pdf));
        assert_eq!(VectorFileFormat::from_path(Path::new("out.png")), None);
        assert_eq!(
            VectorFileFormat::Svg.with_extension(Path::new("out")),
            PathBuf::from("out.svg")
        );
    }

    #[test]
    fn test_scaling_conversion() {
        let s = VectorFileExportSettings {
            content_scaling_value: 127.0,
            ..Default::default()
        };
        let scaling = s.convert_scaling_value(12.7, ContentScaling::Scaling);
        assert!((scaling - 10000.0).abs() < 1e-6);

        let s = VectorFileExportSettings {
            content_scaling_style: ContentScaling::Scaling,
            content_scaling_value: 10000.0,
            ..Default::default()
        };
        let width = s.convert_scaling_value(12.7, ContentScaling::FigureWidthMm);
        assert!((width - 127.0).abs() < 1e-9);
    }

    #[test]
    fn test_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join("settings.json"));

        assert_eq!(store.load().unwrap(), VectorFileExportSettings::default());

        let settings = VectorFileExportSettings {
            file_format: VectorFileFormat::Svg,
            color_mode: ColorMode::Greyscale,
            custom_layers: "metal1 8/0, poly".into(),
            layer_selection_mode: LayerSelectionMode::CustomLayerList,
            ..Default::default()
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn test_store_corrupt_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::new(&path);

        assert!(matches!(store.load(), Err(SettingsError::Json(_))));
        assert_eq!(store.load_or_default(), VectorFileExportSettings::default());
    }
}
