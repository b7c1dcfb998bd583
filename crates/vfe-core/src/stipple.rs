//! 填充图案

use crate::bitmap::{Bitmap, BitmapError};

/// 图层的点阵填充图案：宿主格式字符串 + 解析后的点阵
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stipple {
    source: String,
    bitmap: Bitmap,
}

impl Stipple {
    pub fn parse(source: &str) -> Result<Self, BitmapError> {
        Ok(Self {
            source: source.to_string(),
            bitmap: Bitmap::from_host_string(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    /// 可逆的紧凑标识，用作缓存键
    pub fn id(&self) -> String {
        self.bitmap.to_compact_id()
    }

    /// 全空或全满的图案不需要点阵填充
    pub fn is_solid(&self) -> bool {
        let set = self.bitmap.count_set();
        self.bitmap.is_empty() || set == self.bitmap.width() * self.bitmap.height()
    }

    pub fn is_blank(&self) -> bool {
        self.bitmap.count_set() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_classify() {
        let hatch = Stipple::parse("*...\n.*..\n..*.\n...*").unwrap();
        assert!(!hatch.is_solid());
        assert!(!hatch.is_blank());
        assert_eq!(hatch.id(), hatch.bitmap().to_compact_id());

        assert!(Stipple::parse("**\n**").unwrap().is_solid());
        assert!(Stipple::parse("..\n..").unwrap().is_blank());
        assert!(Stipple::parse("*x").is_err());
    }
}
