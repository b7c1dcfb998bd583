//! 插件注册
//!
//! 在宿主的文件菜单中"打印"之前插入 *Export Vector File…*，
//! 并提供打开对话框、执行导出的入口。

use crate::controller::{DialogPresenter, DialogResult, ExportDialogController};
use crate::dialog::ExportDialog;
use crate::menu::{MenuCommand, MenuItem, MenuRegistry, FILE_MENU};
use crate::notification::Notification;
use vfe_core::view::LayoutView;
use vfe_file::settings::SettingsStore;
use vfe_file::ProgressReporter;

/// 插件菜单项的键
pub const EXPORT_ACTION_KEY: &str = "export_vector_file";
pub const EXPORT_ACTION_TITLE: &str = "Export Vector File…";
/// 插入位置
pub const PRINT_ACTION_KEY: &str = "file_menu.print";

const NOTIFICATION_TITLE: &str = "Export Vector File";

/// 矢量文件导出插件
#[derive(Debug, Clone, Default)]
pub struct VectorFileExportPlugin {
    store: Option<SettingsStore>,
}

impl VectorFileExportPlugin {
    pub const NAME: &'static str = "VectorFileExportPlugin";

    pub fn new(store: Option<SettingsStore>) -> Self {
        Self { store }
    }

    /// 使用用户配置目录中的设置文件
    pub fn with_default_store() -> Self {
        match SettingsStore::open_default() {
            Ok(store) => Self::new(Some(store)),
            Err(e) => {
                tracing::warn!("Export settings will not be persisted: {}", e);
                Self::new(None)
            }
        }
    }

    pub fn store(&self) -> Option<&SettingsStore> {
        self.store.as_ref()
    }

    /// 注册菜单项；重复注册不会产生第二个菜单项
    pub fn register(&self, registry: &mut MenuRegistry) {
        if registry.contains(EXPORT_ACTION_KEY) {
            tracing::debug!("{} already registered", EXPORT_ACTION_KEY);
            return;
        }
        registry.add_menu(FILE_MENU, "File");
        let item = MenuItem::new(EXPORT_ACTION_KEY, EXPORT_ACTION_TITLE, MenuCommand::ExportVectorFile);
        registry.insert_before(FILE_MENU, PRINT_ACTION_KEY, item);
        tracing::debug!("Registered {}", Self::NAME);
    }

    pub fn handles(&self, command: &MenuCommand) -> bool {
        *command == MenuCommand::ExportVectorFile
    }

    /// 可导出的版图；没有打开的版图时返回错误通知
    pub fn exportable_view<'v>(&self, view: Option<&'v dyn LayoutView>) -> Result<&'v dyn LayoutView, Notification> {
        match view {
            Some(view) if view.top_cell().is_some() => Ok(view),
            _ => Err(Notification::error(NOTIFICATION_TITLE, "No layout open to export")),
        }
    }

    /// 创建 egui 对话框
    pub fn dialog(&self, view: Option<&dyn LayoutView>) -> Result<ExportDialog, Notification> {
        let view = self.exportable_view(view)?;
        Ok(ExportDialog::new(view, self.store.clone()))
    }

    /// 创建对话框控制器
    pub fn controller<'v>(&self, view: Option<&'v dyn LayoutView>) -> Result<ExportDialogController<'v>, Notification> {
        let view = self.exportable_view(view)?;
        Ok(match &self.store {
            Some(store) => ExportDialogController::with_store(view, store.clone()),
            None => ExportDialogController::new(view, Default::default()),
        })
    }

    /// 菜单项回调：显示对话框，确认后导出
    ///
    /// 取消时返回 `None`。
    pub fn run(
        &self,
        view: Option<&dyn LayoutView>,
        presenter: &mut dyn DialogPresenter,
        progress: Option<&mut dyn ProgressReporter>,
    ) -> Option<Notification> {
        let mut controller = match self.controller(view) {
            Ok(c) => c,
            Err(n) => return Some(n),
        };
        let request = match controller.open(presenter) {
            DialogResult::Cancelled => return None,
            DialogResult::Confirmed(request) => request,
        };
        let path = request.target_path.clone();
        match controller.dispatch(request, progress) {
            Ok(summary) => Some(Notification::export_finished(&path, &summary)),
            Err(e) => Notification::export_failed(&e),
        }
    }
}
