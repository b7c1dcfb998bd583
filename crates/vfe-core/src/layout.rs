//! 版图数据库
//!
//! ```text
//! Layout (dbu, 图层表)
//! └── Cells[]
//!     ├── shapes: 图层索引 -> 图形列表
//!     └── instances[]: 子单元 + 放置变换
//! ```
//!
//! 坐标以微米存储，`dbu` 仅用于确定输出的最细线宽。

use crate::geometry::Shape;
use crate::layer::{LayerIndex, LayerInfo};
use crate::math::{BoundingBox2, Vector2};
use crate::transform::Transform2D;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// 单元索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellIndex(pub usize);

/// 版图操作错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("Cell not found: {0}")]
    CellNotFound(usize),

    #[error("Layer not found: {0}")]
    LayerNotFound(usize),

    #[error("Instantiating cell {child} in {parent} would create a cycle")]
    CyclicHierarchy { parent: String, child: String },
}

/// 单元实例的放置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    #[serde(default)]
    pub dx: f64,
    #[serde(default)]
    pub dy: f64,
    /// 旋转角度（度）
    #[serde(default)]
    pub angle: f64,
    #[serde(default)]
    pub mirror: bool,
    #[serde(default = "default_mag")]
    pub mag: f64,
}

fn default_mag() -> f64 {
    1.0
}

impl Placement {
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            dx,
            dy,
            ..Default::default()
        }
    }

    pub fn to_transform(&self) -> Transform2D {
        Transform2D::placement(Vector2::new(self.dx, self.dy), self.angle, self.mirror, self.mag)
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            dx: 0.0,
            dy: 0.0,
            angle: 0.0,
            mirror: false,
            mag: 1.0,
        }
    }
}

/// 单元实例
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellInstance {
    pub cell: CellIndex,
    #[serde(default)]
    pub placement: Placement,
}

/// 单元
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub name: String,
    #[serde(default)]
    pub shapes: BTreeMap<LayerIndex, Vec<Shape>>,
    #[serde(default)]
    pub instances: Vec<CellInstance>,
}

impl Cell {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// 指定图层上的图形
    pub fn shapes_on(&self, layer: LayerIndex) -> &[Shape] {
        self.shapes.get(&layer).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn insert(&mut self, layer: LayerIndex, shape: Shape) {
        self.shapes.entry(layer).or_default().push(shape);
    }
}

/// 版图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    /// 数据库单位（µm）
    pub dbu: f64,
    #[serde(default)]
    layers: Vec<LayerInfo>,
    #[serde(default)]
    cells: Vec<Cell>,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(0.001)
    }
}

impl Layout {
    pub fn new(dbu: f64) -> Self {
        Self {
            dbu,
            layers: Vec::new(),
            cells: Vec::new(),
        }
    }

    /// 添加图层（已存在时返回现有索引）
    pub fn insert_layer(&mut self, info: LayerInfo) -> LayerIndex {
        if let Some(idx) = self.find_layer(&info) {
            return idx;
        }
        self.layers.push(info);
        LayerIndex(self.layers.len() - 1)
    }

    pub fn find_layer(&self, info: &LayerInfo) -> Option<LayerIndex> {
        self.layers.iter().position(|l| l.matches(info)).map(LayerIndex)
    }

    pub fn layer_info(&self, index: LayerIndex) -> Option<&LayerInfo> {
        self.layers.get(index.0)
    }

    pub fn layers(&self) -> &[LayerInfo] {
        &self.layers
    }

    pub fn add_cell(&mut self, name: impl Into<String>) -> CellIndex {
        self.cells.push(Cell::new(name));
        CellIndex(self.cells.len() - 1)
    }

    pub fn cell(&self, index: CellIndex) -> Option<&Cell> {
        self.cells.get(index.0)
    }

    pub fn cell_mut(&mut self, index: CellIndex) -> Option<&mut Cell> {
        self.cells.get_mut(index.0)
    }

    pub fn cell_by_name(&self, name: &str) -> Option<CellIndex> {
        self.cells.iter().position(|c| c.name == name).map(CellIndex)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// 在单元中插入图形
    pub fn insert_shape(&mut self, cell: CellIndex, layer: LayerIndex, shape: Shape) -> Result<(), LayoutError> {
        if layer.0 >= self.layers.len() {
            return Err(LayoutError::LayerNotFound(layer.0));
        }
        self.cells
            .get_mut(cell.0)
            .ok_or(LayoutError::CellNotFound(cell.0))?
            .insert(layer, shape);
        Ok(())
    }

    /// 在 `parent` 中放置 `child`，拒绝产生循环引用的实例
    pub fn insert_instance(&mut self, parent: CellIndex, child: CellIndex, placement: Placement) -> Result<(), LayoutError> {
        if child.0 >= self.cells.len() {
            return Err(LayoutError::CellNotFound(child.0));
        }
        if parent.0 >= self.cells.len() {
            return Err(LayoutError::CellNotFound(parent.0));
        }
        if parent == child || self.is_descendant(child, parent) {
            return Err(LayoutError::CyclicHierarchy {
                parent: self.cells[parent.0].name.clone(),
                child: self.cells[child.0].name.clone(),
            });
        }
        self.cells[parent.0].instances.push(CellInstance { cell: child, placement });
        Ok(())
    }

    /// `candidate` 是否为 `cell` 的（间接）子单元
    fn is_descendant(&self, cell: CellIndex, candidate: CellIndex) -> bool {
        let mut stack = vec![cell];
        let mut seen = vec![false; self.cells.len()];
        while let Some(c) = stack.pop() {
            if std::mem::replace(&mut seen[c.0], true) {
                continue;
            }
            for inst in &self.cells[c.0].instances {
                if inst.cell == candidate {
                    return true;
                }
                stack.push(inst.cell);
            }
        }
        false
    }

    /// 检查整个层次结构（用于从文件加载的版图）
    pub fn validate(&self) -> Result<(), LayoutError> {
        for (i, cell) in self.cells.iter().enumerate() {
            for inst in &cell.instances {
                if inst.cell.0 >= self.cells.len() {
                    return Err(LayoutError::CellNotFound(inst.cell.0));
                }
                if inst.cell.0 == i || self.is_descendant(inst.cell, CellIndex(i)) {
                    return Err(LayoutError::CyclicHierarchy {
                        parent: cell.name.clone(),
                        child: self.cells[inst.cell.0].name.clone(),
                    });
                }
            }
            if let Some(layer) = cell.shapes.keys().find(|l| l.0 >= self.layers.len()) {
                return Err(LayoutError::LayerNotFound(layer.0));
            }
        }
        Ok(())
    }

    /// 没有被任何单元引用的单元
    pub fn top_cells(&self) -> Vec<CellIndex> {
        let mut referenced = vec![false; self.cells.len()];
        for cell in &self.cells {
            for inst in &cell.instances {
                if let Some(r) = referenced.get_mut(inst.cell.0) {
                    *r = true;
                }
            }
        }
        (0..self.cells.len())
            .filter(|i| !referenced[*i])
            .map(CellIndex)
            .collect()
    }

    /// 单元（含所有子单元）的包围盒
    pub fn cell_bbox(&self, cell: CellIndex) -> BoundingBox2 {
        let Some(c) = self.cell(cell) else {
            return BoundingBox2::empty();
        };
        let mut bbox = BoundingBox2::empty();
        for shape in c.shapes.values().flatten() {
            bbox = bbox.union(&shape.bounding_box());
        }
        for inst in &c.instances {
            let child = self.cell_bbox(inst.cell);
            bbox = bbox.union(&inst.placement.to_transform().transform_bbox(&child));
        }
        bbox
    }

    /// 递归遍历指定图层上的图形
    ///
    /// 顶层单元深度为 0，只返回深度在 `[min_depth, max_depth]` 内的单元中的图形。
    pub fn shapes_rec(&self, cell: CellIndex, layer: LayerIndex, min_depth: usize, max_depth: usize) -> RecursiveShapeIter<'_> {
        let stack = if self.cell(cell).is_some() {
            vec![Frame {
                cell,
                trans: Transform2D::identity(),
                depth: 0,
                shape_pos: 0,
                inst_pos: 0,
            }]
        } else {
            Vec::new()
        };
        RecursiveShapeIter {
            layout: self,
            layer,
            min_depth,
            max_depth,
            stack,
        }
    }
}

struct Frame {
    cell: CellIndex,
    trans: Transform2D,
    depth: usize,
    shape_pos: usize,
    inst_pos: usize,
}

/// 递归遍历中的一个图形
#[derive(Debug, Clone, Copy)]
pub struct ShapeRef<'a> {
    pub shape: &'a Shape,
    /// 从图形所在单元到顶层单元的累计变换
    pub trans: Transform2D,
    pub cell: CellIndex,
    pub depth: usize,
}

/// 深度优先的递归图形迭代器
pub struct RecursiveShapeIter<'a> {
    layout: &'a Layout,
    layer: LayerIndex,
    min_depth: usize,
    max_depth: usize,
    stack: Vec<Frame>,
}

impl<'a> Iterator for RecursiveShapeIter<'a> {
    type Item = ShapeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let layout = self.layout;
        loop {
            let frame = self.stack.last_mut()?;
            let cell = &layout.cells[frame.cell.0];

            if frame.depth >= self.min_depth && frame.depth <= self.max_depth {
                let shapes = cell.shapes_on(self.layer);
                if let Some(shape) = shapes.get(frame.shape_pos) {
                    frame.shape_pos += 1;
                    return Some(ShapeRef {
                        shape,
                        trans: frame.trans,
                        cell: frame.cell,
                        depth: frame.depth,
                    });
                }
            }

            if frame.depth < self.max_depth {
                if let Some(inst) = cell.instances.get(frame.inst_pos) {
                    frame.inst_pos += 1;
                    let child = Frame {
                        cell: inst.cell,
                        trans: frame.trans.then(&inst.placement.to_transform()),
                        depth: frame.depth + 1,
                        shape_pos: 0,
                        inst_pos: 0,
                    };
                    self.stack.push(child);
                    continue;
                }
            }

            self.stack.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Point2;

    fn hierarchy() -> (Layout, CellIndex, LayerIndex) {
        let mut layout = Layout::new(0.001);
        let m1 = layout.insert_layer(LayerInfo::new(1, 0));
        let top = layout.add_cell("TOP");
        let child = layout.add_cell("CHILD");
        let leaf = layout.add_cell("LEAF");

        let unit = Shape::Box(BoundingBox2::from_ltrb(0.0, 0.0, 1.0, 1.0));
        layout.insert_shape(top, m1, unit.clone()).unwrap();
        layout.insert_shape(child, m1, unit.clone()).unwrap();
        layout.insert_shape(leaf, m1, unit).unwrap();

        layout.insert_instance(top, child, Placement::translation(10.0, 0.0)).unwrap();
        layout.insert_instance(child, leaf, Placement::translation(0.0, 10.0)).unwrap();
        (layout, top, m1)
    }

    #[test]
    fn test_recursive_iteration_accumulates_transforms() {
        let (layout, top, m1) = hierarchy();
        let origins: Vec<(usize, Point2)> = layout
            .shapes_rec(top, m1, 0, usize::MAX)
            .map(|s| (s.depth, s.trans.transform_point(&Point2::origin())))
            .collect();

        assert_eq!(
            origins,
            vec![
                (0, Point2::new(0.0, 0.0)),
                (1, Point2::new(10.0, 0.0)),
                (2, Point2::new(10.0, 10.0)),
            ]
        );
    }

    #[test]
    fn test_depth_window() {
        let (layout, top, m1) = hierarchy();

        assert_eq!(layout.shapes_rec(top, m1, 0, 0).count(), 1);
        assert_eq!(layout.shapes_rec(top, m1, 1, 1).count(), 1);
        assert_eq!(layout.shapes_rec(top, m1, 1, 5).count(), 2);
        assert_eq!(layout.shapes_rec(top, LayerIndex(7), 0, 5).count(), 0);
    }

    #[test]
    fn test_cell_bbox_and_top_cells() {
        let (layout, top, _) = hierarchy();
        let bbox = layout.cell_bbox(top);

        assert_eq!(bbox, BoundingBox2::from_ltrb(0.0, 0.0, 11.0, 11.0));
        assert_eq!(layout.top_cells(), vec![top]);
    }

    #[test]
    fn test_cycles_are_rejected() {
        let (mut layout, top, _) = hierarchy();
        let leaf = layout.cell_by_name("LEAF").unwrap();

        let err = layout.insert_instance(leaf, top, Placement::default()).unwrap_err();
        assert!(matches!(err, LayoutError::CyclicHierarchy { .. }));
        assert!(layout.validate().is_ok());
    }
}
