//! 菜单注册与主菜单

/// 文件菜单
pub const FILE_MENU: &str = "file_menu";

/// 菜单项触发的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuCommand {
    /// 宿主自己处理的操作，携带菜单项键
    Host(String),
    /// 打开矢量文件导出对话框
    ExportVectorFile,
    Separator,
}

/// 菜单项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    /// 全局唯一的键，例如 `file_menu.print`
    pub key: String,
    pub title: String,
    pub shortcut: Option<String>,
    pub command: MenuCommand,
}

impl MenuItem {
    pub fn new(key: impl Into<String>, title: impl Into<String>, command: MenuCommand) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            shortcut: None,
            command,
        }
    }

    /// 由宿主处理的菜单项
    pub fn host(key: impl Into<String>, title: impl Into<String>) -> Self {
        let key = key.into();
        let command = MenuCommand::Host(key.clone());
        Self::new(key, title, command)
    }

    pub fn separator(key: impl Into<String>) -> Self {
        Self::new(key, "", MenuCommand::Separator)
    }

    pub fn with_shortcut(mut self, shortcut: impl Into<String>) -> Self {
        self.shortcut = Some(shortcut.into());
        self
    }

    pub fn is_separator(&self) -> bool {
        self.command == MenuCommand::Separator
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    pub key: String,
    pub title: String,
    pub items: Vec<MenuItem>,
}

/// 宿主的菜单结构
#[derive(Debug, Clone, Default)]
pub struct MenuRegistry {
    menus: Vec<Menu>,
}

impl MenuRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 宿主的默认菜单
    pub fn host_default() -> Self {
        let mut registry = Self::new();
        registry.add_menu(FILE_MENU, "File");
        for item in [
            MenuItem::host("file_menu.open", "Open…").with_shortcut("Ctrl+O"),
            MenuItem::host("file_menu.reload", "Reload"),
            MenuItem::separator("file_menu.separator_print"),
            MenuItem::host("file_menu.print", "Print…").with_shortcut("Ctrl+P"),
            MenuItem::separator("file_menu.separator_exit"),
            MenuItem::host("file_menu.exit", "Exit"),
        ] {
            registry.append(FILE_MENU, item);
        }
        registry.add_menu("view_menu", "View");
        registry.append("view_menu", MenuItem::host("view_menu.zoom_fit", "Zoom Fit").with_shortcut("F2"));
        registry
    }

    /// 添加菜单；已存在时不变
    pub fn add_menu(&mut self, key: &str, title: &str) {
        if self.menu(key).is_none() {
            self.menus.push(Menu {
                key: key.to_string(),
                title: title.to_string(),
                items: Vec::new(),
            });
        }
    }

    pub fn menus(&self) -> &[Menu] {
        &self.menus
    }

    pub fn menu(&self, key: &str) -> Option<&Menu> {
        self.menus.iter().find(|m| m.key == key)
    }

    pub fn contains(&self, item_key: &str) -> bool {
        self.find(item_key).is_some()
    }

    pub fn find(&self, item_key: &str) -> Option<&MenuItem> {
        self.menus.iter().flat_map(|m| m.items.iter()).find(|i| i.key == item_key)
    }

    /// 追加到菜单末尾；菜单不存在时返回 `false`
    pub fn append(&mut self, menu: &str, item: MenuItem) -> bool {
        match self.menus.iter_mut().find(|m| m.key == menu) {
            Some(menu) => {
                menu.items.push(item);
                true
            }
            None => false,
        }
    }

    /// 插入到 `before` 之前；没有 `before` 时追加到末尾
    pub fn insert_before(&mut self, menu: &str, before: &str, item: MenuItem) -> bool {
        let Some(menu) = self.menus.iter_mut().find(|m| m.key == menu) else {
            return false;
        };
        match menu.items.iter().position(|i| i.key == before) {
            Some(pos) => menu.items.insert(pos, item),
            None => menu.items.push(item),
        }
        true
    }
}

/// 渲染菜单栏，返回被点击的菜单项命令
#[allow(deprecated)]
pub fn show_menu_bar(ui: &mut egui::Ui, registry: &MenuRegistry) -> Option<MenuCommand> {
    let mut clicked = None;
    egui::menu::bar(ui, |ui| {
        for menu in registry.menus() {
            ui.menu_button(menu.title.as_str(), |ui| {
                for item in &menu.items {
                    if item.is_separator() {
                        ui.separator();
                        continue;
                    }
                    let mut button = egui::Button::new(item.title.as_str());
                    if let Some(shortcut) = &item.shortcut {
                        button = button.shortcut_text(shortcut.as_str());
                    }
                    if ui.add(button).clicked() {
                        clicked = Some(item.command.clone());
                        ui.close_menu();
                    }
                }
            });
        }
    });
    clicked
}
