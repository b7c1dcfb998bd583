//! PDF 输出
//!
//! 基于 `pdf-writer` 生成，每页一个 flate 压缩的内容流，文本使用标准字体 Courier。
//! 设备坐标 y 向下，写入时翻转为 PDF 的 y 向上。

use crate::error::ExportError;
use crate::painter::{Pen, StippleFill, VectorPainter};
use chrono::{Datelike, Timelike, Utc};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_writer::{Content, Date, Filter, Finish, Name, Pdf, Rect, Ref, Str, TextStr};
use std::io::Write;
use vfe_core::math::Point2;
use vfe_core::properties::Color;

const FONT_NAME: Name<'static> = Name(b"F1");

/// PDF 绘图设备
pub struct PdfPainter {
    width: f64,
    height: f64,
    title: String,
    pages: Vec<Content>,
}

impl PdfPainter {
    /// `page_size` 为页面尺寸（点）
    pub fn new(page_size: (f64, f64), title: &str) -> Self {
        Self {
            width: page_size.0,
            height: page_size.1,
            title: title.to_string(),
            pages: vec![Content::new()],
        }
    }

    fn content(&mut self) -> &mut Content {
        if self.pages.is_empty() {
            self.pages.push(Content::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn flip(&self, p: &Point2) -> (f32, f32) {
        (p.x as f32, (self.height - p.y) as f32)
    }

    fn outline_path(&mut self, points: &[Point2]) {
        let flipped: Vec<(f32, f32)> = points.iter().map(|p| self.flip(p)).collect();
        let content = self.content();
        for (i, (x, y)) in flipped.into_iter().enumerate() {
            if i == 0 {
                content.move_to(x, y);
            } else {
                content.line_to(x, y);
            }
        }
        content.close_path();
    }
}

fn rgb(color: Color) -> (f32, f32, f32) {
    let [r, g, b] = color.unit_rgb();
    (r, g, b)
}

/// 标准字体只支持单字节编码，其他字符替换为 `?`
fn latin1_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 0x100 { c as u32 as u8 } else { b'?' })
        .collect()
}

fn compress(data: &[u8]) -> Result<Vec<u8>, ExportError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn creation_date() -> Date {
    let now = Utc::now();
    Date::new(now.year().clamp(0, 9999) as u16)
        .month(now.month() as u8)
        .day(now.day() as u8)
        .hour(now.hour() as u8)
        .minute(now.minute() as u8)
        .second(now.second() as u8)
        .utc_offset_hour(0)
        .utc_offset_minute(0)
}

impl VectorPainter for PdfPainter {
    fn page_size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn new_page(&mut self) {
        self.pages.push(Content::new());
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color) {
        let page_h = self.height;
        let (r, g, b) = rgb(color);
        let content = self.content();
        content.save_state();
        content.set_fill_rgb(r, g, b);
        content.rect(x as f32, (page_h - y - height) as f32, width as f32, height as f32);
        content.fill_nonzero();
        content.restore_state();
    }

    fn draw_polygon(&mut self, points: &[Point2], pen: &Pen) {
        if points.len() < 2 {
            return;
        }
        let (r, g, b) = rgb(pen.color);
        let content = self.content();
        content.set_stroke_rgb(r, g, b);
        content.set_line_width(pen.width as f32);
        self.outline_path(points);
        self.content().stroke();
    }

    fn fill_stipple(&mut self, outline: &[Point2], fill: &StippleFill<'_>) {
        if outline.len() < 3 || fill.rects.is_empty() {
            return;
        }
        let page_h = self.height;
        let (r, g, b) = rgb(fill.color);

        self.content().save_state();
        self.outline_path(outline);
        let content = self.content();
        content.clip_nonzero();
        content.end_path();
        content.set_fill_rgb(r, g, b);
        for rect in fill.rects {
            let x = fill.origin.x + rect.x as f64 * fill.pixel_size;
            let y = fill.origin.y + rect.y as f64 * fill.pixel_size;
            let w = rect.width as f64 * fill.pixel_size;
            let h = rect.height as f64 * fill.pixel_size;
            content.rect(x as f32, (page_h - y - h) as f32, w as f32, h as f32);
        }
        content.fill_nonzero();
        content.restore_state();
    }

    fn draw_text(&mut self, position: Point2, text: &str, font_size: f64, color: Color) {
        let (x, y) = self.flip(&position);
        let (r, g, b) = rgb(color);
        let bytes = latin1_bytes(text);
        let content = self.content();
        content.set_fill_rgb(r, g, b);
        content.begin_text();
        content.set_font(FONT_NAME, font_size as f32);
        content.next_line(x, y);
        content.show(Str(&bytes));
        content.end_text();
    }

    fn finish(&mut self) -> Result<Vec<u8>, ExportError> {
        let mut alloc = Ref::new(1);
        let catalog_id = alloc.bump();
        let page_tree_id = alloc.bump();
        let font_id = alloc.bump();
        let info_id = alloc.bump();

        let pages = std::mem::take(&mut self.pages);
        let page_ids: Vec<Ref> = pages.iter().map(|_| alloc.bump()).collect();

        let mut pdf = Pdf::new();
        pdf.catalog(catalog_id).pages(page_tree_id);
        pdf.pages(page_tree_id)
            .kids(page_ids.iter().copied())
            .count(page_ids.len() as i32);

        let media_box = Rect::new(0.0, 0.0, self.width as f32, self.height as f32);
        for (content, page_id) in pages.into_iter().zip(page_ids.iter().copied()) {
            let content_id = alloc.bump();
            let mut page = pdf.page(page_id);
            page.media_box(media_box);
            page.parent(page_tree_id);
            page.contents(content_id);
            page.resources().fonts().pair(FONT_NAME, font_id);
            page.finish();

            let data = compress(&content.finish())?;
            pdf.stream(content_id, &data).filter(Filter::FlateDecode);
        }

        pdf.type1_font(font_id).base_font(Name(b"Courier"));
        pdf.document_info(info_id)
            .title(TextStr(&self.title))
            .producer(TextStr("vector-file-export"))
            .creation_date(creation_date());

        tracing::debug!("PdfPainter::finish: {} pages", page_ids.len());
        Ok(pdf.finish())
    }
}
