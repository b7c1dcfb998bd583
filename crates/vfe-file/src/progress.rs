//! 导出进度与取消

/// 导出进度回调
///
/// 导出器在开始时调用一次 `begin_progress`，每导出完一个图层调用一次 `progress`，
/// 每处理一个图形查询一次 `was_canceled`。
pub trait ProgressReporter {
    fn begin_progress(&mut self, total_layers: usize);

    fn progress(&mut self, total_layers: usize, exported_layers: usize);

    fn was_canceled(&self) -> bool {
        false
    }
}

/// 把进度写入日志
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn begin_progress(&mut self, total_layers: usize) {
        tracing::debug!("Exporting {} layers", total_layers);
    }

    fn progress(&mut self, total_layers: usize, exported_layers: usize) {
        tracing::debug!("Exported layer {}/{}", exported_layers, total_layers);
    }
}
