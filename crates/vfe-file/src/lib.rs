//! Vector File Export 导出引擎
//!
//! 支持：
//! - `.pdf`（基于 pdf-writer，可逐图层分页）
//! - `.svg`
//!
//! 以及导出设置的持久化（JSON）。

pub mod design_info;
pub mod error;
pub mod exporter;
pub mod page;
pub mod painter;
pub mod pdf;
pub mod progress;
pub mod settings;
pub mod stipple_cache;
pub mod svg;

pub use design_info::DesignInfo;
pub use error::{ExportError, SettingsError};
pub use exporter::{ExportSummary, VectorFileExporter};
pub use progress::ProgressReporter;
pub use settings::{SettingsStore, VectorFileExportSettings, VectorFileFormat};
