//! Vector File Export 核心模型
//!
//! 提供导出插件所依赖的版图数据模型：图层、图形、单元层次、变换以及点阵填充图案。
//!
//! # 架构设计
//!
//! - `Layout`: 版图数据库（单元、图层表、图形）
//! - `LayerProperties`: 视图中的图层显示属性（颜色、点阵、可见性）
//! - `LayoutView`: 宿主视图句柄，导出插件只通过它访问宿主
//!
//! # 示例
//!
//! ```rust
//! use vfe_core::prelude::*;
//!
//! let view = MemoryView::demo();
//! let top = view.top_cell().unwrap();
//!
//! for lp in view.layers().iter().filter(|lp| lp.visible) {
//!     let index = lp.layer_index.unwrap();
//!     let count = view.layout().shapes_rec(top, index, 0, usize::MAX).count();
//!     println!("{}: {} shapes", lp.display_name(), count);
//! }
//! ```

pub mod bitmap;
pub mod geometry;
pub mod layer;
pub mod layer_spec;
pub mod layout;
pub mod math;
pub mod properties;
pub mod stipple;
pub mod transform;
pub mod view;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::bitmap::Bitmap;
    pub use crate::geometry::{HAlign, Path, Polygon, Shape, Text, VAlign};
    pub use crate::layer::{LayerIndex, LayerInfo, LayerProperties, LayerRef};
    pub use crate::layout::{CellIndex, Layout, Placement};
    pub use crate::math::{BoundingBox2, Point2, Vector2};
    pub use crate::properties::Color;
    pub use crate::stipple::Stipple;
    pub use crate::transform::Transform2D;
    pub use crate::view::{LayoutView, MemoryView};
}
