//! 单色点阵
//!
//! 用于图层的点阵填充图案：
//! - 宿主格式字符串（`*` 为置位像素，`.` 为空像素，每行一条）
//! - 拼版（把图案重复到至少指定尺寸）
//! - PBM (P4) 读写
//! - 可逆的紧凑标识（`[0-9a-z_]`，可直接作为文件名）
//! - 矢量化为矩形（横向游程 + 纵向合并）

use std::io::{BufRead, Write};
use thiserror::Error;

/// 点阵错误
#[derive(Debug, Error)]
pub enum BitmapError {
    #[error("inconsistent line length on line {line}: {len} != {expected}")]
    InconsistentWidth { line: usize, len: usize, expected: usize },

    #[error("invalid character {ch:?} on line {line}")]
    InvalidCharacter { ch: char, line: usize },

    #[error("unsupported PBM format {0:?}")]
    UnsupportedPbm(String),

    #[error("invalid compact bitmap id: {0}")]
    InvalidCompactId(String),

    #[error("bitmap of {width}x{height} pixels is too large")]
    TooLarge { width: usize, height: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 点阵中的一个矩形（像素坐标，y 向下）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// 单个点阵允许的最大像素数
pub const MAX_PIXELS: usize = 1 << 24;

/// 像素数；超过 [`MAX_PIXELS`] 或溢出时返回 `None`
fn pixel_count(width: usize, height: usize) -> Option<usize> {
    width.checked_mul(height).filter(|n| *n <= MAX_PIXELS)
}

/// 单色点阵，按行存储，每像素 0 或 1
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Bitmap {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Bitmap {
    /// 创建全空点阵
    pub fn new(width: usize, height: usize) -> Result<Self, BitmapError> {
        let n = pixel_count(width, height).ok_or(BitmapError::TooLarge { width, height })?;
        Ok(Self {
            width,
            height,
            data: vec![0; n],
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x] != 0
    }

    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        self.data[y * self.width + x] = u8::from(value);
    }

    /// 置位像素数
    pub fn count_set(&self) -> usize {
        self.data.iter().filter(|v| **v != 0).count()
    }

    // ----------------------------------------
    // 宿主格式字符串
    // ----------------------------------------

    /// 解析宿主格式字符串，忽略空行以及每行首尾空白
    pub fn from_host_string(s: &str) -> Result<Self, BitmapError> {
        let lines: Vec<&str> = s.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let Some(first) = lines.first() else {
            return Ok(Self::default());
        };

        let width = first.chars().count();
        let mut bitmap = Self::new(width, lines.len())?;
        for (y, line) in lines.iter().enumerate() {
            let len = line.chars().count();
            if len != width {
                return Err(BitmapError::InconsistentWidth { line: y, len, expected: width });
            }
            for (x, ch) in line.chars().enumerate() {
                match ch {
                    '*' => bitmap.set(x, y, true),
                    '.' => {}
                    _ => return Err(BitmapError::InvalidCharacter { ch, line: y }),
                }
            }
        }
        Ok(bitmap)
    }

    pub fn to_host_string(&self) -> String {
        (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| if self.get(x, y) { '*' } else { '.' })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ----------------------------------------
    // 拼版
    // ----------------------------------------

    /// 拼版尺寸：宽高分别为不小于 `min_w`、`min_h` 的图案整数倍
    ///
    /// 结果超过 [`MAX_PIXELS`] 时返回 `TooLarge`，不分配内存。
    pub fn panel_size(&self, min_w: usize, min_h: usize) -> Result<(usize, usize), BitmapError> {
        if self.is_empty() {
            return Ok((0, 0));
        }
        let too_large = || BitmapError::TooLarge { width: min_w, height: min_h };
        let panel_w = min_w.div_ceil(self.width).max(1).checked_mul(self.width).ok_or_else(too_large)?;
        let panel_h = min_h.div_ceil(self.height).max(1).checked_mul(self.height).ok_or_else(too_large)?;
        pixel_count(panel_w, panel_h).ok_or(BitmapError::TooLarge { width: panel_w, height: panel_h })?;
        Ok((panel_w, panel_h))
    }

    /// 重复图案，得到 [`Bitmap::panel_size`] 大小的拼版
    pub fn panelize(&self, min_w: usize, min_h: usize) -> Result<Self, BitmapError> {
        let (panel_w, panel_h) = self.panel_size(min_w, min_h)?;
        if panel_w == 0 {
            return Ok(Self::default());
        }
        let (nx, ny) = (panel_w / self.width, panel_h / self.height);

        tracing::debug!(
            "Bitmap::panelize: tile {}x{}, requested {}x{} => panel {}x{} ({}x{})",
            self.width, self.height, min_w, min_h, panel_w, panel_h, nx, ny
        );

        let mut panel = Self::new(panel_w, panel_h)?;
        for (y, row) in panel.data.chunks_exact_mut(panel_w).enumerate() {
            let src = &self.data[(y % self.height) * self.width..][..self.width];
            for (x, px) in row.iter_mut().enumerate() {
                *px = src[x % self.width];
            }
        }
        Ok(panel)
    }

    // ----------------------------------------
    // PBM (P4)
    // ----------------------------------------

    /// 写出二进制 PBM
    pub fn write_pbm<W: Write>(&self, out: &mut W) -> Result<(), BitmapError> {
        write!(out, "P4\n{} {}\n", self.width, self.height)?;
        for y in 0..self.height {
            let row = &self.data[y * self.width..(y + 1) * self.width];
            out.write_all(&pack_bits(row))?;
        }
        Ok(())
    }

    /// 读取二进制 PBM
    pub fn read_pbm<R: BufRead>(input: &mut R) -> Result<Self, BitmapError> {
        let mut header_tokens: Vec<String> = Vec::new();
        let mut line = String::new();
        while header_tokens.len() < 3 {
            line.clear();
            if input.read_line(&mut line)? == 0 {
                return Err(BitmapError::UnsupportedPbm("truncated header".into()));
            }
            let content = line.split('#').next().unwrap_or("");
            header_tokens.extend(content.split_whitespace().map(str::to_string));
        }
        if header_tokens[0] != "P4" {
            return Err(BitmapError::UnsupportedPbm(header_tokens[0].clone()));
        }
        let parse = |s: &str| {
            s.parse::<usize>()
                .map_err(|_| BitmapError::UnsupportedPbm(format!("invalid dimension {s:?}")))
        };
        let width = parse(&header_tokens[1])?;
        let height = parse(&header_tokens[2])?;

        let mut bitmap = Self::new(width, height).map_err(|_| {
            BitmapError::UnsupportedPbm(format!("dimensions {width}x{height} too large"))
        })?;
        let row_bytes = width.div_ceil(8);
        let mut row = vec![0u8; row_bytes];
        for y in 0..height {
            input.read_exact(&mut row)?;
            for x in 0..width {
                if row[x / 8] & (0x80 >> (x % 8)) != 0 {
                    bitmap.set(x, y, true);
                }
            }
        }
        Ok(bitmap)
    }

    // ----------------------------------------
    // 紧凑标识
    // ----------------------------------------

    /// `宽_高_数据`，三段均为 base36
    pub fn to_compact_id(&self) -> String {
        format!(
            "{}_{}_{}",
            int_to_base36(self.width as u64),
            int_to_base36(self.height as u64),
            bytes_to_base36(&pack_bits(&self.data))
        )
    }

    pub fn from_compact_id(s: &str) -> Result<Self, BitmapError> {
        let invalid = || BitmapError::InvalidCompactId(s.to_string());
        let mut parts = s.splitn(3, '_');
        let (Some(w), Some(h), Some(data)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        let width = base36_to_int(w).and_then(|v| usize::try_from(v).ok()).ok_or_else(invalid)?;
        let height = base36_to_int(h).and_then(|v| usize::try_from(v).ok()).ok_or_else(invalid)?;
        let mut bitmap = Self::new(width, height).map_err(|_| invalid())?;
        let n_bits = bitmap.data.len();
        let packed = base36_to_bytes(data, n_bits.div_ceil(8)).ok_or_else(invalid)?;

        for i in 0..n_bits {
            bitmap.data[i] = (packed[i / 8] >> (7 - i % 8)) & 1;
        }
        Ok(bitmap)
    }

    // ----------------------------------------
    // 矢量化
    // ----------------------------------------

    /// 把置位像素合并为矩形：先求每行的游程，再把相邻行中位置相同的游程合并
    pub fn to_rects(&self) -> Vec<PixelRect> {
        let mut done: Vec<PixelRect> = Vec::new();
        let mut open: Vec<PixelRect> = Vec::new();

        for y in 0..self.height {
            let runs = self.row_runs(y);
            let mut next_open = Vec::with_capacity(runs.len());
            for (x, width) in runs {
                if let Some(pos) = open.iter().position(|r| r.x == x && r.width == width) {
                    let mut r = open.swap_remove(pos);
                    r.height += 1;
                    next_open.push(r);
                } else {
                    next_open.push(PixelRect { x, y, width, height: 1 });
                }
            }
            done.append(&mut open);
            open = next_open;
        }
        done.append(&mut open);
        done.sort_by_key(|r| (r.y, r.x));
        done
    }

    fn row_runs(&self, y: usize) -> Vec<(usize, usize)> {
        let mut runs = Vec::new();
        let mut x = 0;
        while x < self.width {
            if self.get(x, y) {
                let start = x;
                while x < self.width && self.get(x, y) {
                    x += 1;
                }
                runs.push((start, x - start));
            } else {
                x += 1;
            }
        }
        runs
    }
}

/// 每字节一位 -> 每字节八位（高位在前）
fn pack_bits(bits: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        if *bit != 0 {
            out[i / 8] |= 0x80 >> (i % 8);
        }
    }
    out
}

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn int_to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36_DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

fn base36_to_int(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    u64::from_str_radix(s, 36).ok()
}

/// 把字节串视为大端大整数转换为 base36
fn bytes_to_base36(bytes: &[u8]) -> String {
    let mut num: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
    if num.is_empty() {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while !num.is_empty() {
        let mut rem: u32 = 0;
        let mut quotient = Vec::with_capacity(num.len());
        for b in &num {
            let acc = (rem << 8) | u32::from(*b);
            let q = (acc / 36) as u8;
            rem = acc % 36;
            if !(quotient.is_empty() && q == 0) {
                quotient.push(q);
            }
        }
        digits.push(BASE36_DIGITS[rem as usize]);
        num = quotient;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// `bytes_to_base36` 的逆运算，左侧补零到 `len` 字节
fn base36_to_bytes(s: &str, len: usize) -> Option<Vec<u8>> {
    if s.is_empty() {
        return None;
    }
    let mut num: Vec<u8> = Vec::new(); // 小端
    for ch in s.chars() {
        let digit = ch.to_digit(36)?;
        let mut carry = digit;
        for byte in num.iter_mut() {
            let acc = u32::from(*byte) * 36 + carry;
            *byte = (acc & 0xFF) as u8;
            carry = acc >> 8;
        }
        while carry > 0 {
            num.push((carry & 0xFF) as u8);
            carry >>= 8;
        }
    }
    while num.last() == Some(&0) {
        num.pop();
    }
    if num.len() > len {
        return None;
    }
    num.resize(len, 0);
    num.reverse();
    Some(num)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "
            .*..
            *.**
            ..*.
            ";

    #[test]
    fn test_host_string_round_trip() {
        let b = Bitmap::from_host_string(SAMPLE).unwrap();
        assert_eq!(b.to_host_string(), ".*..\n*.**\n..*.");
    }

    #[test]
    fn test_whitespace_ignored() {
        let b = Bitmap::from_host_string("  .*.\n\n  ***  \n").unwrap();
        assert_eq!(b.width(), 3);
        assert_eq!(b.height(), 2);
        assert!(Bitmap::from_host_string("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(
            Bitmap::from_host_string(".*@\n***"),
            Err(BitmapError::InvalidCharacter { ch: '@', line: 0 })
        ));
        assert!(matches!(
            Bitmap::from_host_string("**.\n****"),
            Err(BitmapError::InconsistentWidth { line: 1, len: 4, expected: 3 })
        ));
    }

    #[test]
    fn test_panelize_repeats_tile() {
        let tile = Bitmap::from_host_string("*.\n..").unwrap();
        let panel = tile.panelize(3, 1).unwrap();

        assert_eq!(panel.width(), 4);
        assert_eq!(panel.height(), 2);
        assert_eq!(panel.to_host_string(), "*.*.\n....");
    }

    #[test]
    fn test_oversized_bitmaps_are_rejected() {
        let tile = Bitmap::from_host_string("*...\n.*..\n..*.\n...*").unwrap();
        assert!(matches!(tile.panelize(1_000_000, 700_000), Err(BitmapError::TooLarge { .. })));
        assert!(matches!(tile.panel_size(usize::MAX, 4), Err(BitmapError::TooLarge { .. })));
        assert_eq!(tile.panel_size(5, 1).unwrap(), (8, 4));
        assert!(matches!(Bitmap::new(usize::MAX, 2), Err(BitmapError::TooLarge { .. })));

        let header = b"P4\n100000 100000\n".to_vec();
        assert!(matches!(
            Bitmap::read_pbm(&mut std::io::Cursor::new(header)),
            Err(BitmapError::UnsupportedPbm(_))
        ));
        assert!(matches!(Bitmap::from_compact_id("zzzz_zzzz_0"), Err(BitmapError::InvalidCompactId(_))));
    }

    #[test]
    fn test_pbm_round_trip_with_padding() {
        let b = Bitmap::from_host_string("*.*.*.*.**\n.........*").unwrap();
        let mut buf = Vec::new();
        b.write_pbm(&mut buf).unwrap();

        assert!(buf.starts_with(b"P4\n10 2\n"));
        assert_eq!(buf.len(), "P4\n10 2\n".len() + 4);

        let read = Bitmap::read_pbm(&mut std::io::Cursor::new(buf)).unwrap();
        assert_eq!(read, b);
    }

    #[test]
    fn test_compact_id_is_reversible() {
        let b = Bitmap::from_host_string(SAMPLE).unwrap();
        let id = b.to_compact_id();

        assert!(id.starts_with("4_3_"));
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        assert_eq!(Bitmap::from_compact_id(&id).unwrap(), b);

        let blank = Bitmap::new(5, 5).unwrap();
        assert_eq!(Bitmap::from_compact_id(&blank.to_compact_id()).unwrap(), blank);
        assert!(Bitmap::from_compact_id("zz").is_err());
    }

    #[test]
    fn test_to_rects_merges_rows() {
        let b = Bitmap::from_host_string("**..\n**.*\n...*").unwrap();
        let rects = b.to_rects();

        assert_eq!(
            rects,
            vec![
                PixelRect { x: 0, y: 0, width: 2, height: 2 },
                PixelRect { x: 3, y: 1, width: 1, height: 2 },
            ]
        );
        let covered: usize = rects.iter().map(|r| r.width * r.height).sum();
        assert_eq!(covered, b.count_set());
    }
}
