//! 点阵图案缓存
//!
//! 把图案拼版到所需尺寸后矢量化为矩形，并按 (图案标识, 宽, 高) 缓存。
//! 可选地把拼版结果以 PBM 保存在磁盘目录中：
//!
//! ```text
//! <dir>/<stipple id>/<w>x<h>/stipple.pbm
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use vfe_core::bitmap::{Bitmap, BitmapError, PixelRect};
use vfe_core::stipple::Stipple;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StippleCacheKey {
    tile_stipple_id: String,
    width: usize,
    height: usize,
}

/// 拼版并矢量化后的图案
#[derive(Debug, Clone, PartialEq)]
pub struct StipplePanel {
    pub stipple_id: String,
    pub width: usize,
    pub height: usize,
    pub rects: Vec<PixelRect>,
}

/// 图案缓存
#[derive(Debug, Default)]
pub struct StippleCache {
    panels: HashMap<StippleCacheKey, StipplePanel>,
    persist_dir: Option<PathBuf>,
    hits: usize,
}

impl StippleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同时把拼版点阵保存到磁盘目录
    pub fn with_persist_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            persist_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// 缓存命中次数
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// 拼版到至少 `min_w` x `min_h` 像素并返回矢量化结果
    pub fn panelize(&mut self, stipple: &Stipple, min_w: usize, min_h: usize) -> Result<&StipplePanel, BitmapError> {
        let tile = stipple.bitmap();
        let (w, h) = tile.panel_size(min_w, min_h)?;
        let key = StippleCacheKey {
            tile_stipple_id: stipple.id(),
            width: w,
            height: h,
        };

        if self.panels.contains_key(&key) {
            self.hits += 1;
        } else {
            let bitmap = self.load_or_create(&key, tile, min_w, min_h)?;
            let panel = StipplePanel {
                stipple_id: key.tile_stipple_id.clone(),
                width: bitmap.width(),
                height: bitmap.height(),
                rects: bitmap.to_rects(),
            };
            tracing::debug!(
                "StippleCache: vectorized {} at {}x{} into {} rects",
                panel.stipple_id,
                panel.width,
                panel.height,
                panel.rects.len()
            );
            self.panels.insert(key.clone(), panel);
        }
        self.panels
            .get(&key)
            .ok_or_else(|| BitmapError::InvalidCompactId(key.tile_stipple_id.clone()))
    }

    fn load_or_create(&self, key: &StippleCacheKey, tile: &Bitmap, min_w: usize, min_h: usize) -> Result<Bitmap, BitmapError> {
        let Some(dir) = &self.persist_dir else {
            return tile.panelize(min_w, min_h);
        };
        let panel_dir = dir
            .join(&key.tile_stipple_id)
            .join(format!("{}x{}", key.width, key.height));
        let pbm_path = panel_dir.join("stipple.pbm");

        if pbm_path.is_file() {
            let mut reader = BufReader::new(File::open(&pbm_path)?);
            match Bitmap::read_pbm(&mut reader) {
                Ok(bitmap) if bitmap.width() == key.width && bitmap.height() == key.height => return Ok(bitmap),
                Ok(_) => tracing::warn!("StippleCache: ignoring stale {}", pbm_path.display()),
                Err(e) => tracing::warn!("StippleCache: ignoring unreadable {}: {}", pbm_path.display(), e),
            }
        }

        let bitmap = tile.panelize(min_w, min_h)?;
        std::fs::create_dir_all(&panel_dir)?;
        let mut writer = BufWriter::new(File::create(&pbm_path)?);
        bitmap.write_pbm(&mut writer)?;
        Ok(bitmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hatch() -> Stipple {
        Stipple::parse("*...\n.*..\n..*.\n...*").unwrap()
    }

    #[test]
    fn test_cache_key_uses_panel_size() {
        let mut cache = StippleCache::new();
        let stipple = hatch();

        let panel = cache.panelize(&stipple, 7, 3).unwrap().clone();
        assert_eq!((panel.width, panel.height), (8, 4));
        assert_eq!(panel.rects.len(), 8);

        // 5x2 拼版后也是 8x4
        cache.panelize(&stipple, 5, 2).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 1);

        cache.panelize(&stipple, 9, 4).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_persisted_panels_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        let stipple = hatch();

        let first = StippleCache::with_persist_dir(dir.path())
            .panelize(&stipple, 8, 8)
            .unwrap()
            .clone();
        let pbm = dir.path().join(stipple.id()).join("8x8").join("stipple.pbm");
        assert!(pbm.is_file());

        let second = StippleCache::with_persist_dir(dir.path())
            .panelize(&stipple, 8, 8)
            .unwrap()
            .clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_corrupt_persisted_panel_is_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let stipple = hatch();
        let panel_dir = dir.path().join(stipple.id()).join("8x8");
        std::fs::create_dir_all(&panel_dir).unwrap();
        std::fs::write(panel_dir.join("stipple.pbm"), b"P4\n99999 99999\n").unwrap();

        let panel = StippleCache::with_persist_dir(dir.path())
            .panelize(&stipple, 8, 8)
            .unwrap()
            .clone();
        assert_eq!((panel.width, panel.height), (8, 8));
        let bytes = std::fs::read(panel_dir.join("stipple.pbm")).unwrap();
        assert!(bytes.starts_with(b"P4\n8 8\n"));
    }

    #[test]
    fn test_oversized_panel_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = StippleCache::with_persist_dir(dir.path());

        let err = cache.panelize(&hatch(), 1_000_000, 1_000_000).unwrap_err();
        assert!(matches!(err, BitmapError::TooLarge { .. }));
        assert!(cache.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
