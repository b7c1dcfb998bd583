//! 可关闭的通知

use std::path::Path;
use vfe_file::{ExportError, ExportSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Error,
}

/// 一条通知
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn export_finished(path: &Path, summary: &ExportSummary) -> Self {
        Self::info(
            "Export Vector File",
            format!(
                "Exported {} layers ({} shapes) to {}",
                summary.layers,
                summary.shapes,
                path.display()
            ),
        )
    }

    /// 用户取消不产生通知
    pub fn export_failed(err: &ExportError) -> Option<Self> {
        if err.is_cancelled() {
            return None;
        }
        Some(Self::error("Export Vector File", format!("Export failed: {}", err)))
    }

    pub fn is_error(&self) -> bool {
        self.kind == NotificationKind::Error
    }
}

/// 通知列表
#[derive(Debug, Default)]
pub struct Notifications {
    items: Vec<Notification>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notification: Notification) {
        match notification.kind {
            NotificationKind::Info => tracing::info!("{}: {}", notification.title, notification.message),
            NotificationKind::Error => tracing::error!("{}: {}", notification.title, notification.message),
        }
        self.items.push(notification);
    }

    pub fn dismiss(&mut self, index: usize) -> Option<Notification> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    /// 在窗口右下角依次显示，每条带关闭按钮
    pub fn show(&mut self, ctx: &egui::Context) {
        let mut dismissed = None;
        for (i, n) in self.items.iter().enumerate() {
            let color = match n.kind {
                NotificationKind::Info => egui::Color32::from_rgb(40, 120, 40),
                NotificationKind::Error => egui::Color32::from_rgb(180, 30, 30),
            };
            egui::Window::new(n.title.as_str())
                .id(egui::Id::new(("notification", i)))
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::RIGHT_BOTTOM, [-12.0, -12.0 - 90.0 * i as f32])
                .show(ctx, |ui| {
                    ui.colored_label(color, n.message.as_str());
                    if ui.button("Dismiss").clicked() {
                        dismissed = Some(i);
                    }
                });
        }
        if let Some(i) = dismissed {
            self.dismiss(i);
        }
    }
}
