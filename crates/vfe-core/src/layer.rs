//! 图层
//!
//! 版图数据库中的图层由 [`LayerInfo`]（层号/数据类型/名称）标识，
//! 视图中的图层列表由 [`LayerProperties`] 描述（显示名称、颜色、点阵图案、可见性）。
//! 导出请求只借用视图中的图层，见 [`LayerRef`]。

use crate::properties::Color;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 版图数据库中的图层索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayerIndex(pub usize);

impl fmt::Display for LayerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 图层标识：层号/数据类型，可附带名称
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LayerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<u32>,
    #[serde(default)]
    pub datatype: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl LayerInfo {
    /// 按层号/数据类型创建
    pub fn new(layer: u32, datatype: u32) -> Self {
        Self {
            layer: Some(layer),
            datatype,
            name: None,
        }
    }

    /// 仅按名称创建
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            layer: None,
            datatype: 0,
            name: Some(name.into()),
        }
    }

    /// 设置名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 判断是否与另一个标识匹配
    ///
    /// 有层号时按层号/数据类型比较，否则按名称比较。
    pub fn matches(&self, other: &LayerInfo) -> bool {
        match (self.layer, other.layer) {
            (Some(a), Some(b)) => a == b && self.datatype == other.datatype,
            _ => self.name.is_some() && self.name == other.name,
        }
    }
}

impl fmt::Display for LayerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, self.layer) {
            (Some(name), Some(layer)) => write!(f, "{} ({}/{})", name, layer, self.datatype),
            (Some(name), None) => f.write_str(name),
            (None, Some(layer)) => write!(f, "{}/{}", layer, self.datatype),
            (None, None) => f.write_str("<unnamed>"),
        }
    }
}

/// 视图中的一个图层条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerProperties {
    /// 显示名称（为空时使用源图层描述）
    #[serde(default)]
    pub name: String,

    /// 源图层
    pub source: LayerInfo,

    /// 绑定的版图图层索引；`None` 表示该条目没有对应的版图图层
    #[serde(default)]
    pub layer_index: Option<LayerIndex>,

    /// 边框颜色
    #[serde(default)]
    pub frame_color: Color,

    /// 填充颜色
    #[serde(default)]
    pub fill_color: Color,

    /// 点阵图案（`*`/`.` 字符串），`None` 表示实心或无填充
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stipple: Option<String>,

    /// 是否可见
    #[serde(default = "default_true")]
    pub visible: bool,

    /// 是否有效
    #[serde(default = "default_true")]
    pub valid: bool,
}

fn default_true() -> bool {
    true
}

impl LayerProperties {
    /// 创建绑定到指定图层索引的条目
    pub fn new(source: LayerInfo, layer_index: LayerIndex) -> Self {
        Self {
            name: String::new(),
            source,
            layer_index: Some(layer_index),
            frame_color: Color::BLACK,
            fill_color: Color::BLACK,
            stipple: None,
            visible: true,
            valid: true,
        }
    }

    pub fn with_colors(mut self, frame: Color, fill: Color) -> Self {
        self.frame_color = frame;
        self.fill_color = fill;
        self
    }

    pub fn with_stipple(mut self, stipple: impl Into<String>) -> Self {
        self.stipple = Some(stipple.into());
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// 显示名称
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.source.to_string()
        } else {
            self.name.clone()
        }
    }

    /// 是否参与"所有可见图层"导出
    pub fn is_exportable(&self) -> bool {
        self.visible && self.valid && self.layer_index.is_some()
    }
}

/// 所有可见且有效的图层索引（按视图顺序，去重）
pub fn visible_layer_indexes(layers: &[LayerProperties]) -> Vec<LayerIndex> {
    let mut indexes: Vec<LayerIndex> = Vec::new();
    for lp in layers.iter().filter(|lp| lp.is_exportable()) {
        if let Some(idx) = lp.layer_index {
            if !indexes.contains(&idx) {
                indexes.push(idx);
            }
        }
    }
    indexes
}

/// 对视图图层条目的借用句柄
///
/// 只在一次导出请求内有效，生命周期绑定到视图。
#[derive(Debug, Clone, Copy)]
pub struct LayerRef<'v> {
    index: LayerIndex,
    properties: &'v LayerProperties,
}

impl<'v> LayerRef<'v> {
    /// 从视图条目创建；未绑定版图图层的条目返回 `None`
    pub fn new(properties: &'v LayerProperties) -> Option<Self> {
        properties.layer_index.map(|index| Self { index, properties })
    }

    pub fn index(&self) -> LayerIndex {
        self.index
    }

    pub fn name(&self) -> String {
        self.properties.display_name()
    }

    pub fn properties(&self) -> &'v LayerProperties {
        self.properties
    }
}

impl PartialEq for LayerRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for LayerRef<'_> {}

impl PartialOrd for LayerRef<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LayerRef<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

impl Hash for LayerRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}
