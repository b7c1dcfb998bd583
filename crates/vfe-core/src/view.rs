//! 版图视图
//!
//! [`LayoutView`] 是宿主提供给导出插件的视图句柄：图层列表、版图数据库、
//! 当前顶层单元、背景色以及层次显示范围。[`MemoryView`] 是一个可从 JSON
//! 加载的内存实现，供宿主程序和测试使用。

use crate::geometry::{HAlign, Path, Polygon, Shape, Text, VAlign};
use crate::layer::{LayerInfo, LayerProperties};
use crate::layout::{CellIndex, Layout, LayoutError, Placement};
use crate::math::{BoundingBox2, Point2};
use crate::properties::Color;
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use thiserror::Error;

/// 视图加载错误
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid layout: {0}")]
    Layout(#[from] LayoutError),

    #[error("Top cell not found: {0}")]
    TopCellNotFound(String),
}

/// 宿主视图句柄
pub trait LayoutView {
    /// 视图标题（通常为文件名）
    fn title(&self) -> &str;

    fn layout(&self) -> &Layout;

    /// 当前显示的顶层单元
    fn top_cell(&self) -> Option<CellIndex>;

    /// 视图中的图层列表（按显示顺序）
    fn layers(&self) -> &[LayerProperties];

    fn background_color(&self) -> Color;

    /// 显示的最小层次级数
    fn min_hier_levels(&self) -> usize;

    /// 显示的最大层次级数
    fn max_hier_levels(&self) -> usize;

    /// 按显示名称或源图层名称查找图层
    fn layer_by_name(&self, name: &str) -> Option<&LayerProperties> {
        self.layers()
            .iter()
            .find(|lp| lp.display_name() == name || lp.source.name.as_deref() == Some(name))
    }

    /// 顶层单元的包围盒；没有顶层单元时为空
    fn top_cell_bbox(&self) -> BoundingBox2 {
        match self.top_cell() {
            Some(cell) => self.layout().cell_bbox(cell),
            None => BoundingBox2::empty(),
        }
    }
}

/// 内存视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryView {
    pub title: String,
    pub layout: Layout,
    /// 顶层单元名称；为空时使用版图中第一个顶层单元
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_cell: Option<String>,
    #[serde(default)]
    pub layers: Vec<LayerProperties>,
    #[serde(default = "default_background")]
    pub background_color: Color,
    #[serde(default)]
    pub min_hier_levels: usize,
    #[serde(default = "default_max_hier_levels")]
    pub max_hier_levels: usize,
}

fn default_background() -> Color {
    Color::WHITE
}

fn default_max_hier_levels() -> usize {
    32
}

impl MemoryView {
    pub fn new(title: impl Into<String>, layout: Layout) -> Self {
        Self {
            title: title.into(),
            layout,
            top_cell: None,
            layers: Vec::new(),
            background_color: default_background(),
            min_hier_levels: 0,
            max_hier_levels: default_max_hier_levels(),
        }
    }

    /// 为版图中的每个图层添加一个可见条目（已有条目的图层除外）
    pub fn add_missing_layers(&mut self) {
        for (i, info) in self.layout.layers().iter().enumerate() {
            if self.layers.iter().any(|lp| lp.layer_index.map(|l| l.0) == Some(i)) {
                continue;
            }
            let index = crate::layer::LayerIndex(i);
            self.layers.push(LayerProperties::new(info.clone(), index));
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ViewError> {
        let view: MemoryView = serde_json::from_str(json)?;
        view.layout.validate()?;
        if let Some(name) = &view.top_cell {
            if view.layout.cell_by_name(name).is_none() {
                return Err(ViewError::TopCellNotFound(name.clone()));
            }
        }
        tracing::debug!(
            "Loaded view {:?}: {} cells, {} layers",
            view.title,
            view.layout.cell_count(),
            view.layers.len()
        );
        Ok(view)
    }

    pub fn load(path: &FsPath) -> Result<Self, ViewError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, ViewError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 演示版图：两个反相器单元放置在顶层单元中
    pub fn demo() -> Self {
        let mut layout = Layout::new(0.001);
        let active = layout.insert_layer(LayerInfo::new(1, 0).with_name("active"));
        let poly = layout.insert_layer(LayerInfo::new(5, 0).with_name("poly"));
        let metal1 = layout.insert_layer(LayerInfo::new(8, 0).with_name("metal1"));
        let via1 = layout.insert_layer(LayerInfo::new(9, 0).with_name("via1"));
        let metal2 = layout.insert_layer(LayerInfo::new(10, 0).with_name("metal2"));
        let text = layout.insert_layer(LayerInfo::new(8, 25).with_name("metal1.label"));

        let top = layout.add_cell("TOP");
        let inv = layout.add_cell("INV");

        let inv_shapes = vec![
            (active, Shape::Box(BoundingBox2::from_ltrb(0.0, 0.5, 3.0, 2.5))),
            (active, Shape::Box(BoundingBox2::from_ltrb(0.0, 4.0, 3.0, 6.5))),
            (
                poly,
                Shape::Path(Path::new(vec![Point2::new(1.5, 0.0), Point2::new(1.5, 7.0)], 0.4)),
            ),
            (metal1, Shape::Box(BoundingBox2::from_ltrb(-0.5, 7.0, 3.5, 7.6))),
            (metal1, Shape::Box(BoundingBox2::from_ltrb(-0.5, -0.6, 3.5, 0.0))),
            (
                metal1,
                Shape::Polygon(Polygon::new(vec![
                    Point2::new(2.2, 1.0),
                    Point2::new(2.8, 1.0),
                    Point2::new(2.8, 6.0),
                    Point2::new(2.2, 6.0),
                ])),
            ),
            (
                text,
                Shape::Text(Text::new("Y", Point2::new(2.5, 3.5)).with_alignment(HAlign::Center, VAlign::Center)),
            ),
        ];
        if let Some(cell) = layout.cell_mut(inv) {
            for (layer, shape) in inv_shapes {
                cell.insert(layer, shape);
            }
        }

        if let Some(cell) = layout.cell_mut(top) {
            cell.insert(metal2, Shape::Box(BoundingBox2::from_ltrb(-1.0, 3.0, 9.0, 3.6)));
            cell.insert(via1, Shape::Box(BoundingBox2::from_ltrb(2.3, 3.1, 2.7, 3.5)));
            cell.insert(via1, Shape::Box(BoundingBox2::from_ltrb(6.3, 3.1, 6.7, 3.5)));
            cell.insert(text, Shape::Text(Text::new("OUT", Point2::new(9.0, 3.3))));
        }
        // TOP -> INV 不会成环
        let _ = layout.insert_instance(top, inv, Placement::default());
        let _ = layout.insert_instance(top, inv, Placement::translation(4.0, 0.0));

        let mut view = MemoryView::new("demo", layout);
        view.top_cell = Some("TOP".into());
        view.layers = vec![
            LayerProperties::new(LayerInfo::new(1, 0).with_name("active"), active)
                .with_colors(Color::from_hex(0x00C000), Color::from_hex(0x00C000))
                .with_stipple("*...\n.*..\n..*.\n...*"),
            LayerProperties::new(LayerInfo::new(5, 0).with_name("poly"), poly)
                .with_colors(Color::RED, Color::RED)
                .with_stipple("*.*.\n.*.*\n*.*.\n.*.*"),
            LayerProperties::new(LayerInfo::new(8, 0).with_name("metal1"), metal1)
                .with_colors(Color::BLUE, Color::from_hex(0x8080FF)),
            LayerProperties::new(LayerInfo::new(9, 0).with_name("via1"), via1)
                .with_colors(Color::BLACK, Color::GRAY),
            LayerProperties::new(LayerInfo::new(10, 0).with_name("metal2"), metal2)
                .with_colors(Color::from_hex(0xC000C0), Color::from_hex(0xE080E0))
                .with_stipple("**..\n**..\n..**\n..**"),
            LayerProperties::new(LayerInfo::new(8, 25).with_name("metal1.label"), text)
                .with_colors(Color::BLUE, Color::BLUE),
        ];
        view
    }
}

impl LayoutView for MemoryView {
    fn title(&self) -> &str {
        &self.title
    }

    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn top_cell(&self) -> Option<CellIndex> {
        match &self.top_cell {
            Some(name) => self.layout.cell_by_name(name),
            None => self.layout.top_cells().first().copied(),
        }
    }

    fn layers(&self) -> &[LayerProperties] {
        &self.layers
    }

    fn background_color(&self) -> Color {
        self.background_color
    }

    fn min_hier_levels(&self) -> usize {
        self.min_hier_levels
    }

    fn max_hier_levels(&self) -> usize {
        self.max_hier_levels
    }
}
