//! Vector File Export 用户界面
//!
//! 导出对话框控制器、菜单注册，以及基于 egui 的即时模式对话框。

pub mod controller;
pub mod dialog;
pub mod form;
pub mod menu;
pub mod notification;
pub mod plugin;

pub use controller::{DialogResult, ExportDialogController, ExportRequest, ValidationError};
pub use dialog::{DialogEvent, ExportDialog};
pub use form::ExportForm;
pub use menu::{MenuCommand, MenuRegistry};
pub use notification::{Notification, Notifications};
pub use plugin::VectorFileExportPlugin;
