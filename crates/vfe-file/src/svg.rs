//! SVG 输出
//!
//! 图形尺寸即画布尺寸，只有一页。每个图层对应一个 `<g>` 分组。

use crate::error::ExportError;
use crate::painter::{Pen, StippleFill, VectorPainter};
use std::fmt::Write as _;
use vfe_core::math::Point2;
use vfe_core::properties::Color;

/// SVG 绘图设备
#[derive(Debug)]
pub struct SvgPainter {
    width: f64,
    height: f64,
    title: String,
    font_family: String,
    body: String,
    clip_count: usize,
    layer_open: bool,
}

impl SvgPainter {
    pub fn new(width: f64, height: f64, title: &str, font_family: &str) -> Self {
        Self {
            width,
            height,
            title: title.to_string(),
            font_family: font_family.to_string(),
            body: String::new(),
            clip_count: 0,
            layer_open: false,
        }
    }

    fn indent(&self) -> &'static str {
        if self.layer_open {
            "    "
        } else {
            "  "
        }
    }
}

fn path_data(points: &[Point2]) -> String {
    let mut d = String::new();
    for (i, p) in points.iter().enumerate() {
        let cmd = if i == 0 { "M" } else { " L" };
        let _ = write!(d, "{} {:.3} {:.3}", cmd, p.x, p.y);
    }
    d.push_str(" Z");
    d
}

/// XML 转义
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

impl VectorPainter for SvgPainter {
    fn page_size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn page_count(&self) -> usize {
        1
    }

    fn new_page(&mut self) {}

    fn begin_layer(&mut self, name: &str) {
        self.end_layer();
        let _ = writeln!(self.body, "  <g class=\"layer\" data-name=\"{}\">", escape_xml(name));
        self.layer_open = true;
    }

    fn end_layer(&mut self) {
        if self.layer_open {
            self.body.push_str("  </g>\n");
            self.layer_open = false;
        }
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color) {
        let _ = writeln!(
            self.body,
            r#"{}<rect x="{:.3}" y="{:.3}" width="{:.3}" height="{:.3}" fill="{}" stroke="none"/>"#,
            self.indent(),
            x,
            y,
            width,
            height,
            color.to_hex_string()
        );
    }

    fn draw_polygon(&mut self, points: &[Point2], pen: &Pen) {
        if points.len() < 2 {
            return;
        }
        let _ = writeln!(
            self.body,
            r#"{}<path d="{}" fill="none" stroke="{}" stroke-width="{:.4}"/>"#,
            self.indent(),
            path_data(points),
            pen.color.to_hex_string(),
            pen.width
        );
    }

    fn fill_stipple(&mut self, outline: &[Point2], fill: &StippleFill<'_>) {
        if outline.len() < 3 || fill.rects.is_empty() {
            return;
        }
        self.clip_count += 1;
        let id = format!("clip{}", self.clip_count);
        let indent = self.indent();

        let _ = writeln!(
            self.body,
            r#"{indent}<clipPath id="{id}"><path d="{}"/></clipPath>"#,
            path_data(outline)
        );
        let _ = writeln!(
            self.body,
            r#"{indent}<g clip-path="url(#{id})" fill="{}" stroke="none">"#,
            fill.color.to_hex_string()
        );
        for r in fill.rects {
            let _ = writeln!(
                self.body,
                r#"{indent}  <rect x="{:.3}" y="{:.3}" width="{:.3}" height="{:.3}"/>"#,
                fill.origin.x + r.x as f64 * fill.pixel_size,
                fill.origin.y + r.y as f64 * fill.pixel_size,
                r.width as f64 * fill.pixel_size,
                r.height as f64 * fill.pixel_size
            );
        }
        let _ = writeln!(self.body, "{indent}</g>");
    }

    fn draw_text(&mut self, position: Point2, text: &str, font_size: f64, color: Color) {
        let _ = writeln!(
            self.body,
            r#"{}<text x="{:.3}" y="{:.3}" font-family="{}" font-size="{:.3}" fill="{}">{}</text>"#,
            self.indent(),
            position.x,
            position.y,
            escape_xml(&self.font_family),
            font_size,
            color.to_hex_string(),
            escape_xml(text)
        );
    }

    fn finish(&mut self) -> Result<Vec<u8>, ExportError> {
        self.end_layer();
        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<svg xmlns="http://www.w3.org/2000/svg" version="1.1"
     width="{w:.3}pt" height="{h:.3}pt"
     viewBox="0 0 {w:.3} {h:.3}">
  <title>{title}</title>
  <desc>Generated by vector-file-export</desc>
"#,
            w = self.width,
            h = self.height,
            title = escape_xml(&self.title)
        );
        svg.push_str(&self.body);
        svg.push_str("</svg>\n");
        Ok(svg.into_bytes())
    }
}
