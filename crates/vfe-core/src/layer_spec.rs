//! 自定义图层列表解析
//!
//! 列表项以逗号、分号或换行分隔，每项可以是：
//!
//! ```text
//! 1/0            层号/数据类型
//! 7              层号（数据类型为 0）
//! poly           名称
//! metal1 1/0     名称 + 层号/数据类型
//! metal1 (1/0)   同上
//! ```

use crate::layer::{LayerIndex, LayerInfo};
use thiserror::Error;

/// 图层列表解析错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayerSpecError {
    #[error("entry {entry}: invalid layer number {text:?}")]
    InvalidNumber { entry: usize, text: String },

    #[error("entry {entry}: malformed layer specification {text:?}")]
    Malformed { entry: usize, text: String },
}

/// 解析结果：成功解析的图层与逐项错误
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerList {
    pub layers: Vec<LayerInfo>,
    pub errors: Vec<LayerSpecError>,
}

impl LayerList {
    /// 解析图层列表字符串；空字符串得到空列表
    pub fn parse(s: &str) -> Self {
        let mut list = LayerList::default();

        let entries = s
            .split([',', ';', '\n'])
            .map(str::trim)
            .filter(|e| !e.is_empty());

        for (entry, text) in entries.enumerate() {
            match parse_entry(entry, text) {
                Ok(info) => list.layers.push(info),
                Err(e) => list.errors.push(e),
            }
        }
        list
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// 按版图图层表解析为图层索引（保持列表顺序，忽略不存在的图层）
    pub fn resolve(&self, layout_layers: &[LayerInfo]) -> Vec<LayerIndex> {
        let mut indexes = Vec::new();
        for spec in &self.layers {
            if let Some(pos) = layout_layers.iter().position(|l| spec.matches(l)) {
                let idx = LayerIndex(pos);
                if !indexes.contains(&idx) {
                    indexes.push(idx);
                }
            }
        }
        indexes
    }

    /// 格式化为可再次解析的字符串
    pub fn to_list_string(layers: &[LayerInfo]) -> String {
        layers
            .iter()
            .map(|l| match (&l.name, l.layer) {
                (Some(name), Some(layer)) => format!("{} {}/{}", name, layer, l.datatype),
                _ => l.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn parse_entry(entry: usize, text: &str) -> Result<LayerInfo, LayerSpecError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.as_slice() {
        [single] => {
            if single.starts_with(|c: char| c.is_ascii_digit()) {
                parse_numbers(entry, single)
            } else if is_name(single) {
                Ok(LayerInfo::named(*single))
            } else {
                Err(LayerSpecError::Malformed {
                    entry,
                    text: text.to_string(),
                })
            }
        }
        [name, numbers] if is_name(name) => {
            let numbers: &str = numbers;
            let numbers = numbers
                .strip_prefix('(')
                .and_then(|n| n.strip_suffix(')'))
                .unwrap_or(numbers);
            Ok(parse_numbers(entry, numbers)?.with_name(*name))
        }
        _ => Err(LayerSpecError::Malformed {
            entry,
            text: text.to_string(),
        }),
    }
}

fn parse_numbers(entry: usize, text: &str) -> Result<LayerInfo, LayerSpecError> {
    let invalid = || LayerSpecError::InvalidNumber {
        entry,
        text: text.to_string(),
    };
    let (layer, datatype) = match text.split_once('/') {
        Some((l, d)) => (l, d),
        None => (text, "0"),
    };
    let layer = layer.trim().parse::<u32>().map_err(|_| invalid())?;
    let datatype = datatype.trim().parse::<u32>().map_err(|_| invalid())?;
    Ok(LayerInfo::new(layer, datatype))
}

fn is_name(s: &str) -> bool {
    s.starts_with(|c: char| c.is_alphabetic() || c == '_')
        && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_entries() {
        let list = LayerList::parse("1/0, 7; poly\nmetal2 (2/0), via1 3/1");

        assert!(list.is_ok());
        assert_eq!(
            list.layers,
            vec![
                LayerInfo::new(1, 0),
                LayerInfo::new(7, 0),
                LayerInfo::named("poly"),
                LayerInfo::new(2, 0).with_name("metal2"),
                LayerInfo::new(3, 1).with_name("via1"),
            ]
        );
    }

    #[test]
    fn test_parse_errors_are_per_entry() {
        let list = LayerList::parse("1/x, 2/0, a b c, ");

        assert_eq!(list.layers, vec![LayerInfo::new(2, 0)]);
        assert_eq!(list.errors.len(), 2);
        assert!(matches!(list.errors[0], LayerSpecError::InvalidNumber { entry: 0, .. }));
        assert!(matches!(list.errors[1], LayerSpecError::Malformed { entry: 2, .. }));
    }

    #[test]
    fn test_resolve_against_layout() {
        let layout_layers = vec![
            LayerInfo::new(1, 0).with_name("metal1"),
            LayerInfo::new(2, 0).with_name("metal2"),
            LayerInfo::named("poly"),
        ];
        let list = LayerList::parse("poly, 2/0, 9/9, 2/0");

        assert_eq!(list.resolve(&layout_layers), vec![LayerIndex(2), LayerIndex(1)]);
    }

    #[test]
    fn test_list_string_reparses() {
        let layers = vec![LayerInfo::new(2, 0).with_name("metal2"), LayerInfo::named("poly")];
        let s = LayerList::to_list_string(&layers);

        assert_eq!(s, "metal2 2/0, poly");
        assert_eq!(LayerList::parse(&s).layers, layers);
    }
}
