//! 图层显示属性
//!
//! 颜色解析与颜色模式转换。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 8 位 RGB
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `0xRRGGBB`，高 8 位忽略
    pub const fn from_hex(rgb: u32) -> Self {
        let [_, r, g, b] = rgb.to_be_bytes();
        Self { r, g, b }
    }

    /// 亮度灰度值（0.299R + 0.587G + 0.114B），保持感知亮度
    pub fn luminance(&self) -> u8 {
        let v = 0.299 * self.r as f64 + 0.587 * self.g as f64 + 0.114 * self.b as f64;
        v.round().clamp(0.0, 255.0) as u8
    }

    /// 转换为灰度颜色
    pub fn to_greyscale(&self) -> Color {
        let v = self.luminance();
        Color::new(v, v, v)
    }

    /// 各分量归一化到 0..=1
    pub fn unit_rgb(&self) -> [f32; 3] {
        [self.r, self.g, self.b].map(|c| f32::from(c) / 255.0)
    }

    /// `#rrggbb` 格式
    pub fn to_hex_string(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub const BLACK: Color = Color::from_hex(0x000000);
    pub const WHITE: Color = Color::from_hex(0xffffff);
    pub const GRAY: Color = Color::from_hex(0x808080);
    pub const RED: Color = Color::from_hex(0xff0000);
    pub const BLUE: Color = Color::from_hex(0x0000ff);
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex_string())
    }
}

/// 颜色解析错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color: {0:?}")]
pub struct ParseColorError(pub String);

impl FromStr for Color {
    type Err = ParseColorError;

    /// 支持 `#rgb`、`#rrggbb` 以及少量颜色名
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseColorError(s.to_string());

        if let Some(hex) = s.strip_prefix('#') {
            let expanded: String = match hex.len() {
                3 => hex.chars().flat_map(|c| [c, c]).collect(),
                6 => hex.to_string(),
                _ => return Err(err()),
            };
            let value = u32::from_str_radix(&expanded, 16).map_err(|_| err())?;
            return Ok(Color::from_hex(value));
        }

        match s.to_ascii_lowercase().as_str() {
            "black" => Ok(Color::BLACK),
            "white" => Ok(Color::WHITE),
            "red" => Ok(Color::RED),
            "blue" => Ok(Color::BLUE),
            "gray" | "grey" => Ok(Color::GRAY),
            _ => Err(err()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!("#ff8000".parse::<Color>().unwrap(), Color::new(255, 128, 0));
        assert_eq!("#f80".parse::<Color>().unwrap(), Color::new(255, 136, 0));
        assert_eq!(" white ".parse::<Color>().unwrap(), Color::WHITE);
        assert!("#12345".parse::<Color>().is_err());
        assert!("chartreuse-ish".parse::<Color>().is_err());
    }

    #[test]
    fn test_greyscale() {
        assert_eq!(Color::WHITE.to_greyscale(), Color::WHITE);
        assert_eq!(Color::RED.luminance(), 76);
        assert_eq!(Color::new(0, 128, 255).to_hex_string(), "#0080ff");
        assert_eq!(Color::default(), Color::BLACK);
        assert_eq!(Color::WHITE.unit_rgb(), [1.0, 1.0, 1.0]);
    }
}
