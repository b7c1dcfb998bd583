//! egui 导出对话框
//!
//! 模态窗口，编辑 [`ExportForm`]。校验错误显示在按钮上方，
//! 确认时交给 [`ExportDialogController`] 校验并导出。

use crate::controller::{ExportDialogController, ValidationError};
use crate::form::ExportForm;
use std::path::{Path, PathBuf};
use vfe_core::math::BoundingBox2;
use vfe_core::view::LayoutView;
use vfe_file::page::{PageFormat, PageOrientation};
use vfe_file::settings::{
    ColorMode, ContentScaling, GeometryReduction, LayerOutputStyle, SettingsStore, TextMode, VectorFileExportSettings,
    VectorFileFormat,
};
use vfe_file::{ExportError, ExportSummary, ProgressReporter};

/// 一帧中用户的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogEvent {
    None,
    /// 需要宿主弹出文件选择框
    Browse,
    Confirm,
    Cancel,
}

/// 导出对话框
#[derive(Debug)]
pub struct ExportDialog {
    form: ExportForm,
    error: Option<ValidationError>,
    bbox: BoundingBox2,
    store: Option<SettingsStore>,
}

impl ExportDialog {
    pub fn new(view: &dyn LayoutView, store: Option<SettingsStore>) -> Self {
        let settings = match &store {
            Some(store) => store.load_or_default(),
            None => VectorFileExportSettings::default(),
        };
        Self {
            form: ExportForm::new(view, settings),
            error: None,
            bbox: view.top_cell_bbox(),
            store,
        }
    }

    pub fn form(&self) -> &ExportForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut ExportForm {
        &mut self.form
    }

    pub fn error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }

    /// 文件选择框的初始目录与文件名
    pub fn browse_start(&self) -> (Option<PathBuf>, String) {
        let path = PathBuf::from(self.form.path_text.trim());
        let dir = path.parent().filter(|d| d.is_dir()).map(Path::to_path_buf);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (dir, name)
    }

    /// 文件选择框返回的路径；扩展名不是支持的格式时改为当前格式的扩展名
    pub fn set_browsed_path(&mut self, path: &Path) {
        let path = match VectorFileFormat::from_path(path) {
            Some(format) => {
                self.form.settings.file_format = format;
                path.to_path_buf()
            }
            None => path.with_extension(self.form.settings.file_format.extension()),
        };
        self.form.path_text = path.display().to_string();
    }

    /// 校验并导出；校验失败时记录错误并返回 `None`，对话框保持打开
    pub fn confirm(
        &mut self,
        view: &dyn LayoutView,
        progress: Option<&mut dyn ProgressReporter>,
    ) -> Option<Result<(PathBuf, ExportSummary), ExportError>> {
        let mut controller = ExportDialogController::from_form(view, self.form.clone(), self.store.clone());
        match controller.validate(&self.form.scale_text, &self.form.path_text) {
            Ok(request) => {
                self.error = None;
                let path = request.target_path.clone();
                Some(controller.dispatch(request, progress).map(|summary| (path, summary)))
            }
            Err(e) => {
                tracing::debug!("ExportDialog: {}", e);
                self.error = Some(e);
                None
            }
        }
    }

    /// 渲染对话框
    pub fn show(&mut self, ctx: &egui::Context) -> DialogEvent {
        let mut event = DialogEvent::None;
        let modal = egui::Modal::new(egui::Id::new("vector_file_export_dialog")).show(ctx, |ui| {
            ui.set_width(460.0);
            ui.heading("Export Vector File");
            ui.add_space(4.0);

            egui::Grid::new("vfe_export_grid")
                .num_columns(2)
                .spacing([12.0, 6.0])
                .show(ui, |ui| {
                    if self.file_rows(ui) {
                        event = DialogEvent::Browse;
                    }
                    self.scaling_rows(ui);
                    self.page_rows(ui);
                    self.style_rows(ui);
                });

            ui.separator();
            self.layer_list(ui);

            if let Some(e) = &self.error {
                ui.add_space(4.0);
                ui.colored_label(egui::Color32::from_rgb(200, 40, 40), e.to_string());
            }

            ui.separator();
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Export").clicked() {
                    event = DialogEvent::Confirm;
                }
                if ui.button("Cancel").clicked() {
                    event = DialogEvent::Cancel;
                }
                if ui.button("Reset").clicked() {
                    self.reset();
                }
            });
        });
        if modal.should_close() && event == DialogEvent::None {
            event = DialogEvent::Cancel;
        }
        event
    }

    fn reset(&mut self) {
        let mut settings = VectorFileExportSettings::default();
        settings.output_path = self.form.settings.output_path.clone();
        self.form.settings = settings;
        self.form.scale_text = crate::form::DEFAULT_SCALE_TEXT.to_string();
        self.error = None;
    }

    /// 返回是否点击了浏览按钮
    fn file_rows(&mut self, ui: &mut egui::Ui) -> bool {
        let form = &mut self.form;
        ui.label("Format");
        let mut format = form.settings.file_format;
        egui::ComboBox::from_id_salt("vfe_format")
            .selected_text(format.name())
            .show_ui(ui, |ui| {
                for f in VectorFileFormat::ALL {
                    ui.selectable_value(&mut format, f, f.name());
                }
            });
        if format != form.settings.file_format {
            form.set_format(format);
        }
        ui.end_row();

        let mut browse = false;
        ui.label("File");
        ui.horizontal(|ui| {
            let edit = egui::TextEdit::singleline(&mut form.path_text).desired_width(300.0);
            if ui.add(edit).changed() {
                form.sync_format_from_path();
            }
            browse = ui.button("Browse…").clicked();
        });
        ui.end_row();

        ui.label("Title");
        ui.text_edit_singleline(&mut form.settings.title);
        ui.end_row();
        browse
    }

    fn scaling_rows(&mut self, ui: &mut egui::Ui) {
        let bbox = self.bbox;
        let form = &mut self.form;

        ui.label("Scale factor");
        ui.text_edit_singleline(&mut form.scale_text);
        ui.end_row();

        ui.label("Content scaling");
        ui.horizontal(|ui| {
            let mut style = form.settings.content_scaling_style;
            ui.radio_value(&mut style, ContentScaling::FigureWidthMm, "Figure size");
            ui.radio_value(&mut style, ContentScaling::Scaling, "Scaling");
            if style != form.settings.content_scaling_style {
                form.set_scaling_style(style, &bbox);
            }
        });
        ui.end_row();

        let (mut width_mm, mut height_mm) = form.figure_size_mm(&bbox);
        let by_figure = form.settings.content_scaling_style == ContentScaling::FigureWidthMm;

        ui.label("Figure width (mm)");
        let response = ui.add_enabled(
            by_figure,
            egui::DragValue::new(&mut width_mm).speed(0.5).range(0.1..=10_000.0),
        );
        if response.changed() {
            form.set_figure_width_mm(width_mm, &bbox);
        }
        ui.end_row();

        ui.label("Figure height (mm)");
        let response = ui.add_enabled(
            by_figure,
            egui::DragValue::new(&mut height_mm).speed(0.5).range(0.1..=10_000.0),
        );
        if response.changed() {
            form.set_figure_height_mm(height_mm, &bbox);
        }
        ui.end_row();

        ui.label("Scaling");
        let mut scaling = if bbox.width() > 0.0 {
            width_mm / bbox.width() * 1e3
        } else {
            0.0
        };
        let response = ui.add_enabled(
            !by_figure,
            egui::DragValue::new(&mut scaling).speed(10.0).range(0.001..=f64::MAX),
        );
        if response.changed() {
            form.set_figure_width_mm(scaling * bbox.width() / 1e3, &bbox);
        }
        ui.end_row();
    }

    fn page_rows(&mut self, ui: &mut egui::Ui) {
        let settings = &mut self.form.settings;
        let is_pdf = settings.file_format == VectorFileFormat::Pdf;

        ui.label("Page");
        ui.add_enabled_ui(is_pdf, |ui| {
            ui.horizontal(|ui| {
                egui::ComboBox::from_id_salt("vfe_page_format")
                    .selected_text(settings.page_format.to_string())
                    .show_ui(ui, |ui| {
                        for page in PageFormat::STANDARD {
                            ui.selectable_value(&mut settings.page_format, page, page.to_string());
                        }
                    });
                ui.radio_value(&mut settings.page_orientation, PageOrientation::Portrait, "Portrait");
                ui.radio_value(&mut settings.page_orientation, PageOrientation::Landscape, "Landscape");
            });
        });
        ui.end_row();

        ui.label("");
        let mut per_layer = settings.layer_output_style == LayerOutputStyle::PagePerLayer;
        if ui
            .add_enabled(is_pdf, egui::Checkbox::new(&mut per_layer, "One page per layer"))
            .changed()
        {
            settings.layer_output_style = if per_layer {
                LayerOutputStyle::PagePerLayer
            } else {
                LayerOutputStyle::SinglePage
            };
        }
        ui.end_row();
    }

    fn style_rows(&mut self, ui: &mut egui::Ui) {
        let settings = &mut self.form.settings;

        ui.label("Colors");
        egui::ComboBox::from_id_salt("vfe_color_mode")
            .selected_text(settings.color_mode.name())
            .show_ui(ui, |ui| {
                for mode in ColorMode::ALL {
                    ui.selectable_value(&mut settings.color_mode, mode, mode.name());
                }
            });
        ui.end_row();

        ui.label("");
        ui.vertical(|ui| {
            let color = settings.color_mode == ColorMode::Color;
            ui.add_enabled(
                color,
                egui::Checkbox::new(&mut settings.include_background_color, "Include background color"),
            );
            ui.checkbox(&mut settings.include_stipples, "Fill with stipple patterns");
            let mut omit = settings.geometry_reduction == GeometryReduction::OmitSmallPolygons;
            if ui.checkbox(&mut omit, "Omit polygons smaller than 2 px").changed() {
                settings.geometry_reduction = if omit {
                    GeometryReduction::OmitSmallPolygons
                } else {
                    GeometryReduction::None
                };
            }
        });
        ui.end_row();

        ui.label("Texts");
        ui.horizontal(|ui| {
            ui.radio_value(&mut settings.text_mode, TextMode::None, "None");
            ui.radio_value(&mut settings.text_mode, TextMode::AllVisible, "All visible");
            ui.radio_value(&mut settings.text_mode, TextMode::OnlyTopCell, "Top cell only");
        });
        ui.end_row();

        ui.label("Text layers");
        ui.horizontal(|ui| {
            ui.checkbox(&mut settings.text_layers_filter_enabled, "");
            ui.add_enabled(
                settings.text_layers_filter_enabled,
                egui::TextEdit::singleline(&mut settings.text_layers).hint_text("e.g. 8/25, metal1.label"),
            );
        });
        ui.end_row();
    }

    fn layer_list(&mut self, ui: &mut egui::Ui) {
        let form = &mut self.form;
        ui.horizontal(|ui| {
            ui.label(format!("Layers ({} of {} selected)", form.checked_count(), form.layers.len()));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.small_button("None").clicked() {
                    form.check_all(false);
                }
                if ui.small_button("All").clicked() {
                    form.check_all(true);
                }
            });
        });
        egui::ScrollArea::vertical().max_height(180.0).show(ui, |ui| {
            for toggle in &mut form.layers {
                ui.checkbox(&mut toggle.checked, toggle.name.as_str());
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfe_core::view::MemoryView;

    #[test]
    fn test_browsed_path_gets_format_suffix() {
        let view = MemoryView::demo();
        let mut dialog = ExportDialog::new(&view, None);

        dialog.set_browsed_path(Path::new("/tmp/chip"));
        assert_eq!(dialog.form().path_text, "/tmp/chip.pdf");

        dialog.set_browsed_path(Path::new("/tmp/chip.svg"));
        assert_eq!(dialog.form().settings.file_format, VectorFileFormat::Svg);
        assert_eq!(dialog.form().path_text, "/tmp/chip.svg");
    }

    #[test]
    fn test_confirm_keeps_dialog_open_on_error() {
        let view = MemoryView::demo();
        let mut dialog = ExportDialog::new(&view, None);
        dialog.form_mut().scale_text = "0".into();
        assert!(dialog.confirm(&view, None).is_none());
        assert!(matches!(dialog.error(), Some(ValidationError::NonPositiveScale(_))));
    }

    #[test]
    fn test_confirm_exports() {
        let dir = tempfile::tempdir().unwrap();
        let view = MemoryView::demo();
        let mut dialog = ExportDialog::new(&view, None);
        dialog.form_mut().path_text = dir.path().join("a.pdf").display().to_string();

        let (path, summary) = dialog.confirm(&view, None).unwrap().unwrap();
        assert_eq!(path, dir.path().join("a.pdf"));
        assert!(summary.layers > 0);
        assert!(dialog.error().is_none());
    }

    #[test]
    fn test_browse_start() {
        let dir = tempfile::tempdir().unwrap();
        let view = MemoryView::demo();
        let mut dialog = ExportDialog::new(&view, None);
        dialog.form_mut().path_text = dir.path().join("x.svg").display().to_string();
        let (start, name) = dialog.browse_start();
        assert_eq!(start.as_deref(), Some(dir.path()));
        assert_eq!(name, "x.svg");
    }

    #[test]
    fn test_reset_keeps_last_directory() {
        let view = MemoryView::demo();
        let mut dialog = ExportDialog::new(&view, None);
        dialog.form_mut().settings.color_mode = ColorMode::Color;
        dialog.form_mut().scale_text = "4".into();
        dialog.reset();
        assert_eq!(dialog.form().settings.color_mode, ColorMode::BlackAndWhite);
        assert_eq!(dialog.form().scale_text, "1.0");
    }
}
