//! 导出对话框控制器
//!
//! 流程为 打开 → 校验 → 导出 → 关闭：
//!
//! - [`ExportDialogController::open`] 通过 [`DialogPresenter`] 以模态方式显示表单，
//!   校验失败时把错误交回表单，直到用户确认有效输入或取消
//! - [`ExportDialogController::validate`] 把原始输入转换为 [`ExportRequest`]
//! - [`ExportDialogController::dispatch`] 交给 [`ExportBackend`] 绘制，
//!   先写入同目录的临时文件再改名，失败时不会留下残缺的目标文件
//!
//! 取消不做任何文件操作，设置也只在真正导出时保存。

use crate::form::ExportForm;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use vfe_core::layer::{visible_layer_indexes, LayerIndex, LayerInfo, LayerRef};
use vfe_core::layer_spec::LayerList;
use vfe_core::view::LayoutView;
use vfe_file::design_info::DesignInfo;
use vfe_file::settings::{LayerSelectionMode, SettingsStore, VectorFileExportSettings, VectorFileFormat};
use vfe_file::{ExportError, ExportSummary, ProgressReporter, VectorFileExporter};

/// 表单校验错误，在对话框中就地显示
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Scale is not a number: '{0}'")]
    UnparsableScale(String),

    #[error("Scale must be greater than zero (got {0})")]
    NonPositiveScale(f64),

    #[error("No layers selected for export")]
    EmptyLayerSet,

    #[error("Layer '{0}' is no longer part of the view")]
    UnknownLayer(String),

    #[error("Invalid output path {path:?}: {reason}")]
    InvalidPath { path: PathBuf, reason: &'static str },
}

/// 一次导出请求
///
/// 借用视图中的图层条目，只在本次导出中有效。
#[derive(Debug, Clone)]
pub struct ExportRequest<'v> {
    pub target_path: PathBuf,
    pub format: VectorFileFormat,
    /// 在内容缩放设置之上的缩放系数，总是大于 0
    pub scale: f64,
    pub included_layers: BTreeSet<LayerRef<'v>>,
    /// 其余导出设置，`file_format` 与 `output_path` 已与请求一致
    pub settings: VectorFileExportSettings,
}

impl ExportRequest<'_> {
    pub fn includes(&self, index: LayerIndex) -> bool {
        self.included_layers.iter().any(|l| l.index() == index)
    }

    /// 按视图中的显示顺序排列的图层索引
    pub fn layer_indexes_in(&self, view: &dyn LayoutView) -> Vec<LayerIndex> {
        let mut indexes: Vec<LayerIndex> = Vec::new();
        for index in view.layers().iter().filter_map(|lp| lp.layer_index) {
            if self.includes(index) && !indexes.contains(&index) {
                indexes.push(index);
            }
        }
        indexes
    }

    pub fn layer_names(&self) -> Vec<String> {
        self.included_layers.iter().map(|l| l.name()).collect()
    }
}

/// 对话框结果
#[derive(Debug)]
pub enum DialogResult<'v> {
    Cancelled,
    Confirmed(ExportRequest<'v>),
}

/// 用户在对话框中的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    Confirm,
    Cancel,
}

/// 模态显示表单
pub trait DialogPresenter {
    /// 显示表单直到用户确认或取消；`error` 是上一次确认时的校验错误
    fn present(&mut self, form: &mut ExportForm, error: Option<&ValidationError>) -> DialogAction;
}

/// 绘制后端
pub trait ExportBackend {
    /// 按请求绘制并把完整的文件内容写入 `out`
    fn render(
        &mut self,
        view: &dyn LayoutView,
        request: &ExportRequest<'_>,
        out: &mut dyn Write,
        progress: Option<&mut dyn ProgressReporter>,
    ) -> Result<ExportSummary, ExportError>;
}

/// 使用 [`VectorFileExporter`] 绘制
#[derive(Debug, Default)]
pub struct VectorExportBackend;

impl ExportBackend for VectorExportBackend {
    fn render(
        &mut self,
        view: &dyn LayoutView,
        request: &ExportRequest<'_>,
        out: &mut dyn Write,
        progress: Option<&mut dyn ProgressReporter>,
    ) -> Result<ExportSummary, ExportError> {
        let layers = request.layer_indexes_in(view);
        let design_info = DesignInfo::for_layers(view, &request.settings, layers, request.scale)?;
        let mut exporter = VectorFileExporter::with_design_info(view, request.settings.clone(), design_info);
        exporter.render_to(out, progress)
    }
}

/// 导出对话框控制器
pub struct ExportDialogController<'v> {
    view: &'v dyn LayoutView,
    form: ExportForm,
    store: Option<SettingsStore>,
    backend: Box<dyn ExportBackend>,
}

impl<'v> ExportDialogController<'v> {
    pub fn new(view: &'v dyn LayoutView, settings: VectorFileExportSettings) -> Self {
        Self {
            view,
            form: ExportForm::new(view, settings),
            store: None,
            backend: Box::new(VectorExportBackend),
        }
    }

    /// 从设置存储读取上次的设置，导出时写回
    pub fn with_store(view: &'v dyn LayoutView, store: SettingsStore) -> Self {
        let settings = store.load_or_default();
        let mut controller = Self::new(view, settings);
        controller.store = Some(store);
        controller
    }

    /// 使用已编辑的表单（界面对话框确认时）
    pub fn from_form(view: &'v dyn LayoutView, form: ExportForm, store: Option<SettingsStore>) -> Self {
        Self {
            view,
            form,
            store,
            backend: Box::new(VectorExportBackend),
        }
    }

    pub fn with_backend(mut self, backend: Box<dyn ExportBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn view(&self) -> &'v dyn LayoutView {
        self.view
    }

    pub fn form(&self) -> &ExportForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut ExportForm {
        &mut self.form
    }

    /// 模态显示对话框
    pub fn open(&mut self, presenter: &mut dyn DialogPresenter) -> DialogResult<'v> {
        let mut last_error: Option<ValidationError> = None;
        loop {
            match presenter.present(&mut self.form, last_error.as_ref()) {
                DialogAction::Cancel => {
                    debug!("ExportDialogController::open: cancelled");
                    return DialogResult::Cancelled;
                }
                DialogAction::Confirm => {
                    let scale = self.form.scale_text.clone();
                    let path = self.form.path_text.clone();
                    match self.validate(&scale, &path) {
                        Ok(request) => return DialogResult::Confirmed(request),
                        Err(e) => {
                            debug!("ExportDialogController::open: {}", e);
                            last_error = Some(e);
                        }
                    }
                }
            }
        }
    }

    /// 校验缩放系数、图层勾选和输出路径（按此顺序）
    pub fn validate(&self, raw_scale: &str, raw_path: &str) -> Result<ExportRequest<'v>, ValidationError> {
        let scale = parse_scale(raw_scale)?;

        let checked: Vec<_> = self.form.layers.iter().filter(|t| t.checked).collect();
        if checked.is_empty() {
            return Err(ValidationError::EmptyLayerSet);
        }
        let view: &'v dyn LayoutView = self.view;
        let mut included_layers = BTreeSet::new();
        for toggle in checked {
            let layer = view
                .layers()
                .iter()
                .find(|lp| lp.layer_index == Some(toggle.index))
                .and_then(LayerRef::new)
                .ok_or_else(|| ValidationError::UnknownLayer(toggle.name.clone()))?;
            included_layers.insert(layer);
        }

        let raw_path = raw_path.trim();
        let form_format = self.form.settings.file_format;
        let format = VectorFileFormat::from_path(Path::new(raw_path)).unwrap_or(form_format);
        let target_path = format.with_extension(Path::new(raw_path));
        check_target_path(&target_path)?;

        let mut settings = self.form.settings.clone();
        settings.file_format = format;
        settings.output_path = target_path.clone();
        remember_layer_selection(view, &included_layers, &mut settings);

        Ok(ExportRequest {
            target_path,
            format,
            scale,
            included_layers,
            settings,
        })
    }

    /// 执行导出；保存设置后绘制到临时文件，成功后改名为目标文件
    pub fn dispatch(
        &mut self,
        request: ExportRequest<'v>,
        progress: Option<&mut dyn ProgressReporter>,
    ) -> Result<ExportSummary, ExportError> {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&request.settings) {
                warn!("Unable to save export settings to {}: {}", store.path().display(), e);
            }
        }

        let part = part_path(&request.target_path);
        let result = write_via(&part, &request.target_path, |out| {
            self.backend.render(self.view, &request, out, progress)
        });
        match &result {
            Ok(summary) => info!(
                "Exported {} layers to {}",
                summary.layers,
                request.target_path.display()
            ),
            Err(e) => {
                if let Err(rm) = fs::remove_file(&part) {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!("Unable to remove {}: {}", part.display(), rm);
                    }
                }
                if e.is_cancelled() {
                    info!("Export to {} cancelled", request.target_path.display());
                } else {
                    error!("Export to {} failed: {}", request.target_path.display(), e);
                }
            }
        }
        result
    }
}

fn parse_scale(raw: &str) -> Result<f64, ValidationError> {
    let text = raw.trim();
    let scale: f64 = text
        .parse()
        .map_err(|_| ValidationError::UnparsableScale(text.to_string()))?;
    if scale.is_nan() || scale <= 0.0 {
        return Err(ValidationError::NonPositiveScale(scale));
    }
    if scale.is_infinite() {
        return Err(ValidationError::UnparsableScale(text.to_string()));
    }
    Ok(scale)
}

/// 目标文件必须可以创建或覆盖
fn check_target_path(path: &Path) -> Result<(), ValidationError> {
    let invalid = |reason: &'static str| ValidationError::InvalidPath {
        path: path.to_path_buf(),
        reason,
    };
    if path.as_os_str().is_empty() {
        return Err(invalid("path is empty"));
    }
    if path.file_name().is_none() {
        return Err(invalid("path has no file name"));
    }

    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    match fs::metadata(parent) {
        Ok(meta) if !meta.is_dir() => return Err(invalid("parent is not a directory")),
        Ok(meta) if meta.permissions().readonly() => return Err(invalid("directory is read-only")),
        Ok(_) => {}
        Err(_) => return Err(invalid("parent directory does not exist")),
    }

    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Err(invalid("path is a directory")),
        Ok(meta) if meta.permissions().readonly() => Err(invalid("file is read-only")),
        _ => Ok(()),
    }
}

/// 所选图层等于可见图层时记为"所有可见图层"，否则保存为自定义图层列表
fn remember_layer_selection(
    view: &dyn LayoutView,
    included: &BTreeSet<LayerRef<'_>>,
    settings: &mut VectorFileExportSettings,
) {
    let mut visible = visible_layer_indexes(view.layers());
    visible.sort();
    let chosen: Vec<LayerIndex> = included.iter().map(|l| l.index()).collect();
    if chosen == visible {
        settings.layer_selection_mode = LayerSelectionMode::AllVisibleLayers;
    } else {
        let sources: Vec<LayerInfo> = included.iter().map(|l| l.properties().source.clone()).collect();
        settings.layer_selection_mode = LayerSelectionMode::CustomLayerList;
        settings.custom_layers = LayerList::to_list_string(&sources);
    }
}

/// `out.svg` -> `out.svg.part`
fn part_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    target.with_file_name(name)
}

fn write_via<F>(part: &Path, target: &Path, render: F) -> Result<ExportSummary, ExportError>
where
    F: FnOnce(&mut dyn Write) -> Result<ExportSummary, ExportError>,
{
    let mut out = BufWriter::new(File::create(part)?);
    let summary = render(&mut out)?;
    out.flush()?;
    drop(out);
    fs::rename(part, target)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use vfe_core::view::MemoryView;

    /// 依次执行预设操作的对话框
    struct ScriptedPresenter {
        steps: Vec<(Option<&'static str>, DialogAction)>,
        errors: Vec<Option<ValidationError>>,
    }

    impl ScriptedPresenter {
        fn new(steps: Vec<(Option<&'static str>, DialogAction)>) -> Self {
            Self { steps, errors: Vec::new() }
        }
    }

    impl DialogPresenter for ScriptedPresenter {
        fn present(&mut self, form: &mut ExportForm, error: Option<&ValidationError>) -> DialogAction {
            self.errors.push(error.cloned());
            let (scale, action) = self.steps.remove(0);
            if let Some(scale) = scale {
                form.scale_text = scale.to_string();
            }
            action
        }
    }

    struct CountingBackend {
        calls: Rc<Cell<usize>>,
    }

    impl ExportBackend for CountingBackend {
        fn render(
            &mut self,
            _view: &dyn LayoutView,
            _request: &ExportRequest<'_>,
            out: &mut dyn Write,
            _progress: Option<&mut dyn ProgressReporter>,
        ) -> Result<ExportSummary, ExportError> {
            self.calls.set(self.calls.get() + 1);
            out.write_all(b"ok")?;
            Ok(ExportSummary::default())
        }
    }

    /// 写入一部分内容后失败
    struct FailingBackend;

    impl ExportBackend for FailingBackend {
        fn render(
            &mut self,
            _view: &dyn LayoutView,
            _request: &ExportRequest<'_>,
            out: &mut dyn Write,
            _progress: Option<&mut dyn ProgressReporter>,
        ) -> Result<ExportSummary, ExportError> {
            out.write_all(b"%PDF-1.7 truncated")?;
            Err(ExportError::render("device lost"))
        }
    }

    fn controller(view: &MemoryView) -> ExportDialogController<'_> {
        ExportDialogController::new(view, VectorFileExportSettings::default())
    }

    #[test]
    fn test_non_positive_scale() {
        let view = MemoryView::demo();
        let mut c = controller(&view);
        c.form_mut().check_all(false);
        for raw in ["0", "0.0", "-0.0", "-1", "-1e-9", " -2.5 "] {
            match c.validate(raw, "") {
                Err(ValidationError::NonPositiveScale(s)) => assert!(s <= 0.0),
                other => panic!("{raw}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_unparsable_scale() {
        let view = MemoryView::demo();
        let c = controller(&view);
        for raw in ["", "abc", "1,5", "inf"] {
            assert!(matches!(c.validate(raw, "x.pdf"), Err(ValidationError::UnparsableScale(_))), "{raw}");
        }
    }

    #[test]
    fn test_empty_layer_set() {
        let dir = tempfile::tempdir().unwrap();
        let view = MemoryView::demo();
        let mut c = controller(&view);
        c.form_mut().check_all(false);
        let path = dir.path().join("out.pdf");
        assert_eq!(c.validate("1.0", &path.display().to_string()).unwrap_err(), ValidationError::EmptyLayerSet);
        // 图层在路径之前检查
        assert_eq!(c.validate("1.0", "").unwrap_err(), ValidationError::EmptyLayerSet);
    }

    #[test]
    fn test_unknown_layer() {
        let view = MemoryView::demo();
        let mut c = controller(&view);
        c.form_mut().layers[0].index = LayerIndex(99);
        assert!(matches!(c.validate("1", "x.pdf"), Err(ValidationError::UnknownLayer(_))));
    }

    #[test]
    fn test_invalid_paths() {
        let dir = tempfile::tempdir().unwrap();
        let view = MemoryView::demo();
        let c = controller(&view);

        let is_invalid = |p: &str| matches!(c.validate("1", p), Err(ValidationError::InvalidPath { .. }));
        assert!(is_invalid(""));
        assert!(is_invalid("   "));
        assert!(is_invalid(&dir.path().join("missing").join("out.pdf").display().to_string()));

        let sub = dir.path().join("sub.pdf");
        fs::create_dir(&sub).unwrap();
        assert!(is_invalid(&sub.display().to_string()));

        let locked = dir.path().join("locked.pdf");
        fs::write(&locked, b"old").unwrap();
        let mut perms = fs::metadata(&locked).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&locked, perms).unwrap();
        assert!(is_invalid(&locked.display().to_string()));
    }

    #[test]
    fn test_validate_builds_request() {
        let dir = tempfile::tempdir().unwrap();
        let view = MemoryView::demo();
        let mut c = controller(&view);
        c.form_mut().check_only(&["metal1", "metal2 (10/0)"]);

        let request = c.validate("2", &dir.path().join("chip").display().to_string()).unwrap();
        assert_eq!(request.target_path, dir.path().join("chip.pdf"));
        assert_eq!(request.format, VectorFileFormat::Pdf);
        assert_eq!(request.scale, 2.0);
        assert_eq!(request.layer_names(), vec!["metal1 (8/0)", "metal2 (10/0)"]);
        assert_eq!(request.settings.layer_selection_mode, LayerSelectionMode::CustomLayerList);
        assert_eq!(request.settings.custom_layers, "metal1 8/0, metal2 10/0");

        let request = c.validate("1", &dir.path().join("chip.svg").display().to_string()).unwrap();
        assert_eq!(request.format, VectorFileFormat::Svg);
        assert_eq!(request.settings.file_format, VectorFileFormat::Svg);

        c.form_mut().check_all(true);
        let request = c.validate("1", &dir.path().join("all.pdf").display().to_string()).unwrap();
        assert_eq!(request.settings.layer_selection_mode, LayerSelectionMode::AllVisibleLayers);
    }

    #[test]
    fn test_dispatch_writes_requested_format() {
        let dir = tempfile::tempdir().unwrap();
        let view = MemoryView::demo();
        let mut c = controller(&view);

        let pdf = dir.path().join("out.pdf");
        let request = c.validate("1.0", &pdf.display().to_string()).unwrap();
        c.dispatch(request, None).unwrap();
        assert!(fs::read(&pdf).unwrap().starts_with(b"%PDF-"));

        let svg = dir.path().join("out.svg");
        let request = c.validate("1.0", &svg.display().to_string()).unwrap();
        c.dispatch(request, None).unwrap();
        let text = fs::read_to_string(&svg).unwrap();
        assert!(text.contains("<svg"));
        assert!(!dir.path().join("out.svg.part").exists());
    }

    #[test]
    fn test_scaled_svg_of_two_metals() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("config").join("settings.json"));
        let view = MemoryView::demo();
        let mut c = ExportDialogController::with_store(&view, store.clone());
        c.form_mut().check_all(false);
        for name in ["metal1", "metal2"] {
            assert!(c.form_mut().set_layer_checked(name, true));
        }

        let path = dir.path().join("out.svg");
        let request = c.validate("2.0", &path.display().to_string()).unwrap();
        let summary = c.dispatch(request, None).unwrap();

        assert_eq!(summary.layers, 2);
        let svg = fs::read_to_string(&path).unwrap();
        assert!(!svg.is_empty());
        assert!(svg.contains("data-name=\"metal1 (8/0)\""));
        assert!(svg.contains("data-name=\"metal2 (10/0)\""));
        assert!(!svg.contains("data-name=\"poly (5/0)\""));

        let saved = store.load().unwrap();
        assert_eq!(saved.file_format, VectorFileFormat::Svg);
        assert_eq!(saved.output_path, path);
    }

    #[test]
    fn test_huge_scale_with_stipples_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let view = MemoryView::demo();
        let mut c = controller(&view);
        c.form_mut().settings.include_stipples = true;

        let path = dir.path().join("big.svg");
        let request = c.validate("10000", &path.display().to_string()).unwrap();
        let err = c.dispatch(request, None).unwrap_err();

        assert!(matches!(err, ExportError::RenderFailed(_)), "{err}");
        assert!(!path.exists());
        assert!(!dir.path().join("big.svg.part").exists());
    }

    #[test]
    fn test_negative_scale_never_dispatches() {
        let view = MemoryView::demo();
        let calls = Rc::new(Cell::new(0));
        let c = controller(&view).with_backend(Box::new(CountingBackend { calls: calls.clone() }));
        assert!(matches!(c.validate("-1.0", "/tmp/out.svg"), Err(ValidationError::NonPositiveScale(_))));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_open_retries_until_valid() {
        let dir = tempfile::tempdir().unwrap();
        let view = MemoryView::demo();
        let mut c = controller(&view);
        c.form_mut().path_text = dir.path().join("x.pdf").display().to_string();

        let mut presenter = ScriptedPresenter::new(vec![
            (Some("-1"), DialogAction::Confirm),
            (Some("2"), DialogAction::Confirm),
        ]);
        match c.open(&mut presenter) {
            DialogResult::Confirmed(request) => assert_eq!(request.scale, 2.0),
            DialogResult::Cancelled => panic!("expected confirmation"),
        }
        assert_eq!(presenter.errors[0], None);
        assert!(matches!(presenter.errors[1], Some(ValidationError::NonPositiveScale(_))));
    }

    #[test]
    fn test_cancel_performs_no_io() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        let view = MemoryView::demo();
        let calls = Rc::new(Cell::new(0));
        let mut c = ExportDialogController::with_store(&view, store)
            .with_backend(Box::new(CountingBackend { calls: calls.clone() }));
        c.form_mut().path_text = dir.path().join("out.pdf").display().to_string();

        let mut presenter = ScriptedPresenter::new(vec![(Some("3"), DialogAction::Cancel)]);
        assert!(matches!(c.open(&mut presenter), DialogResult::Cancelled));
        assert_eq!(calls.get(), 0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_render_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let view = MemoryView::demo();
        let mut c = controller(&view).with_backend(Box::new(FailingBackend));

        let path = dir.path().join("out.pdf");
        let request = c.validate("1", &path.display().to_string()).unwrap();
        let err = c.dispatch(request, None).unwrap_err();
        assert!(matches!(err, ExportError::RenderFailed(_)));
        assert!(!path.exists());
        assert!(!dir.path().join("out.pdf.part").exists());

        // 已有文件保持不变
        fs::write(&path, b"previous").unwrap();
        let request = c.validate("1", &path.display().to_string()).unwrap();
        assert!(c.dispatch(request, None).is_err());
        assert_eq!(fs::read(&path).unwrap(), b"previous");
    }

    #[test]
    fn test_part_path() {
        assert_eq!(part_path(Path::new("/tmp/out.svg")), PathBuf::from("/tmp/out.svg.part"));
        assert_eq!(part_path(Path::new("out.pdf")), PathBuf::from("out.pdf.part"));
    }
}
