//! Vector File Export 宿主应用程序
//!
//! 显示版图视图，菜单中注册矢量文件导出插件。
//! 命令行参数为视图 JSON 文件；没有参数时使用演示版图。

use anyhow::{Context as _, Result};
use eframe::egui;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use vfe_core::geometry::Shape;
use vfe_core::math::{BoundingBox2, Point2};
use vfe_core::properties::Color;
use vfe_core::view::{LayoutView, MemoryView};
use vfe_file::settings::VectorFileFormat;
use vfe_file::ProgressReporter;
use vfe_ui::menu::show_menu_bar;
use vfe_ui::{DialogEvent, ExportDialog, MenuCommand, MenuRegistry, Notification, Notifications, VectorFileExportPlugin};

/// 把导出进度写入状态栏
#[derive(Default)]
struct StatusProgress {
    message: String,
}

impl ProgressReporter for StatusProgress {
    fn begin_progress(&mut self, total_layers: usize) {
        self.message = format!("Exported 0 / {} layers", total_layers);
    }

    fn progress(&mut self, total_layers: usize, exported_layers: usize) {
        self.message = format!("Exported {} / {} layers", exported_layers, total_layers);
    }
}

struct VfeApp {
    view: Option<MemoryView>,
    view_path: Option<PathBuf>,
    registry: MenuRegistry,
    plugin: VectorFileExportPlugin,
    export_dialog: Option<ExportDialog>,
    notifications: Notifications,
    status: String,

    // 视图状态
    camera_center: Point2,
    camera_zoom: f64,
    fit_pending: bool,
}

impl VfeApp {
    fn new(view: MemoryView, view_path: Option<PathBuf>) -> Self {
        let mut registry = MenuRegistry::host_default();
        let plugin = VectorFileExportPlugin::with_default_store();
        plugin.register(&mut registry);

        let status = format!("Loaded {}", view.title);
        Self {
            view: Some(view),
            view_path,
            registry,
            plugin,
            export_dialog: None,
            notifications: Notifications::new(),
            status,
            camera_center: Point2::origin(),
            camera_zoom: 1.0,
            fit_pending: true,
        }
    }

    fn load_view(&mut self, path: &Path) {
        match MemoryView::load(path) {
            Ok(view) => {
                info!("Loaded view {} from {}", view.title, path.display());
                self.status = format!("Loaded {}", path.display());
                self.view = Some(view);
                self.view_path = Some(path.to_path_buf());
                self.fit_pending = true;
            }
            Err(e) => {
                self.notifications
                    .push(Notification::error("Open", format!("Failed to open {}: {}", path.display(), e)));
            }
        }
    }

    fn handle_command(&mut self, ctx: &egui::Context, command: MenuCommand) {
        if self.plugin.handles(&command) {
            self.open_export_dialog();
            return;
        }
        let MenuCommand::Host(key) = command else {
            return;
        };
        match key.as_str() {
            "file_menu.open" => {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("Layout view", &["json"])
                    .set_title("Open layout view")
                    .pick_file()
                {
                    self.load_view(&path);
                }
            }
            "file_menu.reload" => match self.view_path.clone() {
                Some(path) => self.load_view(&path),
                None => self.status = "Nothing to reload".to_string(),
            },
            "file_menu.print" => self.status = "Printing is not available".to_string(),
            "file_menu.exit" => ctx.send_viewport_cmd(egui::ViewportCommand::Close),
            "view_menu.zoom_fit" => self.fit_pending = true,
            other => tracing::debug!("Unhandled menu item {}", other),
        }
    }

    fn open_export_dialog(&mut self) {
        let view: Option<&dyn LayoutView> = self.view.as_ref().map(|v| v as &dyn LayoutView);
        match self.plugin.dialog(view) {
            Ok(dialog) => self.export_dialog = Some(dialog),
            Err(notification) => self.notifications.push(notification),
        }
    }

    fn show_export_dialog(&mut self, ctx: &egui::Context) {
        if self.view.is_none() {
            self.export_dialog = None;
        }
        let (Some(dialog), Some(view)) = (self.export_dialog.as_mut(), self.view.as_ref()) else {
            return;
        };
        match dialog.show(ctx) {
            DialogEvent::None => {}
            DialogEvent::Cancel => self.export_dialog = None,
            DialogEvent::Browse => {
                let format = dialog.form().settings.file_format;
                let (dir, name) = dialog.browse_start();
                let mut file_dialog = rfd::FileDialog::new()
                    .set_title("Export Vector File")
                    .add_filter(format.name(), &[format.extension()])
                    .set_file_name(name.as_str());
                for other in VectorFileFormat::ALL.into_iter().filter(|f| *f != format) {
                    file_dialog = file_dialog.add_filter(other.name(), &[other.extension()]);
                }
                if let Some(dir) = dir {
                    file_dialog = file_dialog.set_directory(dir);
                }
                if let Some(path) = file_dialog.save_file() {
                    dialog.set_browsed_path(&path);
                }
            }
            DialogEvent::Confirm => {
                let mut progress = StatusProgress::default();
                match dialog.confirm(view, Some(&mut progress)) {
                    None => {}
                    Some(Ok((path, summary))) => {
                        self.status = progress.message;
                        self.notifications.push(Notification::export_finished(&path, &summary));
                        self.export_dialog = None;
                    }
                    Some(Err(e)) => {
                        if let Some(n) = Notification::export_failed(&e) {
                            self.notifications.push(n);
                        }
                        self.status = "Export failed".to_string();
                        self.export_dialog = None;
                    }
                }
            }
        }
    }

    /// 世界坐标转屏幕坐标（y 轴翻转）
    fn world_to_screen(&self, point: Point2, rect: &egui::Rect) -> egui::Pos2 {
        let center = rect.center();
        let x = center.x + ((point.x - self.camera_center.x) * self.camera_zoom) as f32;
        let y = center.y - ((point.y - self.camera_center.y) * self.camera_zoom) as f32;
        egui::Pos2::new(x, y)
    }

    fn zoom_fit(&mut self, bbox: &BoundingBox2, rect: &egui::Rect) {
        if bbox.is_empty() || bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            return;
        }
        self.camera_center = bbox.center();
        let zoom_x = rect.width() as f64 / bbox.width();
        let zoom_y = rect.height() as f64 / bbox.height();
        self.camera_zoom = zoom_x.min(zoom_y) * 0.9;
    }

    fn draw_view(&self, painter: &egui::Painter, rect: &egui::Rect) {
        let Some(view) = &self.view else {
            return;
        };
        let Some(top) = view.top_cell() else {
            return;
        };
        let min_depth = view.min_hier_levels().saturating_sub(1);
        let max_depth = view.max_hier_levels().saturating_sub(1);

        for lp in view.layers().iter().filter(|lp| lp.is_exportable()) {
            let Some(layer) = lp.layer_index else {
                continue;
            };
            let stroke = egui::Stroke::new(1.0, color32(lp.frame_color));
            for shape_ref in view.layout().shapes_rec(top, layer, min_depth, max_depth) {
                match shape_ref.shape {
                    Shape::Text(text) => {
                        let pos = shape_ref.trans.transform_point(&text.position);
                        painter.text(
                            self.world_to_screen(pos, rect),
                            egui::Align2::CENTER_CENTER,
                            &text.string,
                            egui::FontId::monospace(12.0),
                            color32(lp.frame_color),
                        );
                    }
                    shape => {
                        if let Some(hull) = shape.transformed_hull(&shape_ref.trans) {
                            let points: Vec<egui::Pos2> = hull.iter().map(|p| self.world_to_screen(*p, rect)).collect();
                            painter.add(egui::Shape::closed_line(points, stroke));
                        }
                    }
                }
            }
        }
    }

    fn layers_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Layers");
        ui.separator();
        let Some(view) = self.view.as_mut() else {
            ui.label("No layout");
            return;
        };
        egui::ScrollArea::vertical().show(ui, |ui| {
            for lp in &mut view.layers {
                ui.horizontal(|ui| {
                    let (rect, _) = ui.allocate_exact_size(egui::vec2(10.0, 10.0), egui::Sense::hover());
                    ui.painter().rect_filled(rect, 1.0, color32(lp.fill_color));
                    let name = lp.display_name();
                    ui.checkbox(&mut lp.visible, name);
                });
            }
        });
    }
}

fn color32(c: Color) -> egui::Color32 {
    egui::Color32::from_rgb(c.r, c.g, c.b)
}

impl eframe::App for VfeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let title = match &self.view {
            Some(view) => format!("Vector File Export - {}", view.title),
            None => "Vector File Export".to_string(),
        };
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(title));

        // ===== 顶部菜单 =====
        let mut command = None;
        egui::TopBottomPanel::top("menu").show(ctx, |ui| {
            command = show_menu_bar(ui, &self.registry);
        });
        if ctx.input(|i| i.key_pressed(egui::Key::F2)) {
            command = Some(MenuCommand::Host("view_menu.zoom_fit".to_string()));
        }
        if let Some(command) = command {
            self.handle_command(ctx, command);
        }

        // ===== 状态栏 =====
        let cell_count = self.view.as_ref().map(|v| v.layout.cell_count()).unwrap_or(0);
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("Cells: {}", cell_count));
                });
            });
        });

        // ===== 右侧面板 - 图层 =====
        egui::SidePanel::right("layers")
            .default_width(180.0)
            .show(ctx, |ui| self.layers_panel(ui));

        // ===== 绘图区域 =====
        let background = self
            .view
            .as_ref()
            .map(|v| color32(v.background_color()))
            .unwrap_or(egui::Color32::WHITE);
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(background))
            .show(ctx, |ui| {
                let available_rect = ui.available_rect_before_wrap();
                let (response, painter) = ui.allocate_painter(available_rect.size(), egui::Sense::click_and_drag());
                let rect = response.rect;

                if self.fit_pending {
                    let bbox = self.view.as_ref().map(|v| v.top_cell_bbox()).unwrap_or_else(BoundingBox2::empty);
                    self.zoom_fit(&bbox, &rect);
                    self.fit_pending = false;
                }

                // 滚轮缩放
                let scroll_delta = ui.input(|i| i.raw_scroll_delta);
                if scroll_delta.y.abs() > 0.0 && response.hovered() {
                    let zoom_factor = if scroll_delta.y > 0.0 { 1.1 } else { 0.9 };
                    self.camera_zoom *= zoom_factor;
                }

                // 拖动平移
                if response.dragged() {
                    let delta = response.drag_delta();
                    self.camera_center.x -= delta.x as f64 / self.camera_zoom;
                    self.camera_center.y += delta.y as f64 / self.camera_zoom;
                }

                self.draw_view(&painter, &rect);
            });

        self.show_export_dialog(ctx);
        self.notifications.show(ctx);
    }
}

fn main() -> Result<()> {
    // 初始化日志
    tracing::subscriber::set_global_default(FmtSubscriber::builder().with_max_level(Level::INFO).finish())?;

    let view_path = std::env::args().nth(1).map(PathBuf::from);
    let view = match &view_path {
        Some(path) => MemoryView::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => MemoryView::demo(),
    };
    info!("Starting Vector File Export with view {}", view.title);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("Vector File Export"),
        ..Default::default()
    };

    eframe::run_native(
        "Vector File Export",
        native_options,
        Box::new(move |_cc| Ok(Box::new(VfeApp::new(view, view_path)))),
    )
    .map_err(|e| anyhow::anyhow!("eframe error: {}", e))?;

    Ok(())
}
