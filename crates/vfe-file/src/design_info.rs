//! 设计尺寸信息
//!
//! 从视图与导出设置推导出输出图形的尺寸：
//!
//! ```text
//! fig_width_pt   = fig_width_inch * 72
//! scale_um_to_pt = fig_width_pt / width_um
//! fig_height_pt  = scale_um_to_pt * height_um
//! scaling        = scale_um_to_pt * mm_per_pt * 1000
//! um_per_pixel   = width_um / (fig_width_inch * 72)
//! ```

use crate::error::ExportError;
use crate::page::{MM_PER_PT, PT_PER_INCH};
use crate::settings::{LayerSelectionMode, VectorFileExportSettings};
use vfe_core::layer::{visible_layer_indexes, LayerIndex};
use vfe_core::layer_spec::LayerList;
use vfe_core::layout::CellIndex;
use vfe_core::math::BoundingBox2;
use vfe_core::view::LayoutView;

/// 一次导出的尺寸信息
#[derive(Debug, Clone, PartialEq)]
pub struct DesignInfo {
    pub cell: Option<CellIndex>,
    pub bbox: BoundingBox2,
    pub dbu: f64,
    /// 导出的图层（按输出顺序）
    pub layer_indexes: Vec<LayerIndex>,
    /// 文本图层过滤
    pub text_filter_layer_indexes: Vec<LayerIndex>,
    /// 在内容缩放设置之上的额外缩放系数
    pub scale: f64,
    fig_width_inch: f64,
}

impl DesignInfo {
    pub fn new(bbox: BoundingBox2, dbu: f64, layer_indexes: Vec<LayerIndex>, settings: &VectorFileExportSettings) -> Self {
        Self {
            cell: None,
            bbox,
            dbu,
            layer_indexes,
            text_filter_layer_indexes: Vec::new(),
            scale: 1.0,
            fig_width_inch: settings.fig_width_inch(bbox.width()),
        }
    }

    /// 从视图创建，图层按设置中的图层选择方式确定
    pub fn for_layout_view(view: &dyn LayoutView, settings: &VectorFileExportSettings) -> Result<Self, ExportError> {
        let layers = Self::selected_layers(view, settings);
        Self::for_layers(view, settings, layers, 1.0)
    }

    /// 从视图创建，使用给定的图层和缩放系数
    pub fn for_layers(
        view: &dyn LayoutView,
        settings: &VectorFileExportSettings,
        layer_indexes: Vec<LayerIndex>,
        scale: f64,
    ) -> Result<Self, ExportError> {
        let cell = view
            .top_cell()
            .ok_or_else(|| ExportError::render("view has no top cell"))?;
        let bbox = view.layout().cell_bbox(cell);
        if bbox.is_empty() || bbox.width() <= 0.0 {
            return Err(ExportError::render("nothing to export: the top cell is empty"));
        }
        if !(scale > 0.0) {
            return Err(ExportError::render(format!("invalid scale {scale}")));
        }

        let mut info = Self::new(bbox, view.layout().dbu, layer_indexes, settings);
        info.cell = Some(cell);
        info.scale = scale;
        info.fig_width_inch *= scale;
        if settings.text_layers_filter_enabled {
            info.text_filter_layer_indexes = LayerList::parse(&settings.text_layers).resolve(view.layout().layers());
        }
        Ok(info)
    }

    /// 按设置选择图层：自定义列表有解析错误时退回到可见图层
    pub fn selected_layers(view: &dyn LayoutView, settings: &VectorFileExportSettings) -> Vec<LayerIndex> {
        if settings.layer_selection_mode == LayerSelectionMode::CustomLayerList && !settings.custom_layers.trim().is_empty() {
            let list = LayerList::parse(&settings.custom_layers);
            if list.is_ok() {
                return list.resolve(view.layout().layers());
            }
            for e in &list.errors {
                tracing::warn!("Custom layer list: {}; using visible layers", e);
            }
        }
        visible_layer_indexes(view.layers())
    }

    pub fn width_um(&self) -> f64 {
        self.bbox.width()
    }

    pub fn height_um(&self) -> f64 {
        self.bbox.height()
    }

    pub fn fig_width_inch(&self) -> f64 {
        self.fig_width_inch
    }

    pub fn fig_width_pt(&self) -> f64 {
        self.fig_width_inch * PT_PER_INCH
    }

    pub fn scale_um_to_pt(&self) -> f64 {
        self.fig_width_pt() / self.width_um()
    }

    pub fn fig_height_pt(&self) -> f64 {
        self.scale_um_to_pt() * self.height_um()
    }

    pub fn fig_width_mm(&self) -> f64 {
        round6(self.fig_width_pt() * MM_PER_PT)
    }

    pub fn fig_height_mm(&self) -> f64 {
        round6(self.fig_height_pt() * MM_PER_PT)
    }

    /// 1 µm 对应的输出长度（µm），即比例尺 1:scaling 的倒数形式
    pub fn scaling(&self) -> f64 {
        self.scale_um_to_pt() * MM_PER_PT * 1e3
    }

    /// 72 dpi 下每像素对应的微米数
    pub fn um_per_pixel(&self) -> f64 {
        self.width_um() / (self.fig_width_inch * PT_PER_INCH)
    }

    /// 小于 2 像素的图形不可见
    pub fn min_feature_size_um(&self) -> f64 {
        self.um_per_pixel() * 2.0
    }
}

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}
