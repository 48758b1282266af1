//! Desktop pad for logging training sets and tracking personal records.

use eframe::{App, Frame, NativeOptions, egui};
use rfd::FileDialog;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use log::info;

mod history;
use history::{HistoryLoad, HistoryStore};
mod menu;
use menu::{MenuCatalog, ParamId};
mod quantize;
use quantize::Direction;
mod session;
use session::Session;
mod settings;
use settings::Settings;

const TOAST_DURATION: Duration = Duration::from_secs(3);
const RECORD_BREAKING_COLOR: egui::Color32 = egui::Color32::from_rgb(0xF4, 0x43, 0x36);
const RECORD_BUTTON_COLOR: egui::Color32 = egui::Color32::from_rgb(0x7B, 0x1F, 0xA2);
const EXERCISE_BUTTON_COLOR: egui::Color32 = egui::Color32::from_rgb(0x19, 0x76, 0xD2);

struct Toast {
    message: String,
    is_error: bool,
    start: Instant,
}

struct PadApp {
    session: Session,
    settings: Settings,
    /// Text sink receiving exercise headings and recorded sets.
    output: String,
    toast: Option<Toast>,
    settings_dirty: bool,
}

impl Default for PadApp {
    fn default() -> Self {
        Self::new(Settings::load())
    }
}

impl PadApp {
    fn new(settings: Settings) -> Self {
        let menu_path = settings.menu_path();
        if settings.seed_default_menu && !menu_path.exists() {
            match menu::write_default_menu(&menu_path) {
                Ok(()) => info!("Wrote default menu to {}", menu_path.display()),
                Err(e) => log::warn!("Could not write default menu {}: {e}", menu_path.display()),
            }
        }
        let catalog = Rc::new(MenuCatalog::load_or_empty(&menu_path));
        let history = HistoryStore::open(settings.history_path(), Rc::clone(&catalog));
        let mut app = Self {
            session: Session::new(catalog, history),
            settings,
            output: String::new(),
            toast: None,
            settings_dirty: false,
        };
        if app.session.history().load_status() == HistoryLoad::Discarded {
            let message = format!(
                "Could not read {}, starting with empty history",
                app.session.history().path().display()
            );
            app.notify(message, true);
        }
        app.restore_selection();
        app
    }

    fn restore_selection(&mut self) {
        let restored = match self.settings.last_exercise.clone() {
            Some(name) => self.session.select(&name).is_ok(),
            None => false,
        };
        if !restored && !self.session.catalog().is_empty() {
            let _ = self.session.select_index(0);
        }
    }

    fn notify(&mut self, message: impl Into<String>, is_error: bool) {
        self.toast = Some(Toast {
            message: message.into(),
            is_error,
            start: Instant::now(),
        });
    }

    fn insert_text(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn choose(&mut self, index: usize) {
        if self.session.select_index(index).is_ok() {
            self.settings.last_exercise = self.session.selected_name().map(str::to_string);
            self.settings_dirty = true;
        }
    }

    fn output_exercise(&mut self) {
        match self.session.exercise_line() {
            Ok(line) => {
                self.insert_text(&line);
                self.notify("Exercise added", false);
            }
            Err(e) => self.notify(e.to_string(), true),
        }
    }

    fn output_record(&mut self) {
        match self.session.commit() {
            Ok(commit) => {
                self.insert_text(&commit.text);
                self.notify(commit.message(), !commit.saved);
            }
            Err(e) => self.notify(e.to_string(), true),
        }
    }

    fn load_menu(&mut self, path: PathBuf) {
        match MenuCatalog::load(&path) {
            Ok(catalog) => {
                let count = catalog.len();
                let skipped = catalog.skipped().len();
                self.session.reload_catalog(Rc::new(catalog));
                if self.session.selection().is_none() {
                    let _ = self.session.select_index(0);
                }
                let mut message = format!("Loaded {count} exercises from {}", path.display());
                if skipped > 0 {
                    message.push_str(&format!(" ({skipped} lines skipped)"));
                }
                self.notify(message, false);
                self.settings.menu_file = path;
                self.settings.last_exercise = self.session.selected_name().map(str::to_string);
                self.settings_dirty = true;
            }
            Err(e) => {
                log::warn!("{e}");
                self.notify(e.to_string(), true);
            }
        }
    }

    fn forget_selected(&mut self) {
        match self.session.forget_selected() {
            Ok(()) => self.notify("History for this exercise removed", false),
            Err(e) => self.notify(e.to_string(), true),
        }
    }

    fn clear_history(&mut self) {
        match self.session.clear_history() {
            Ok(()) => self.notify("All training history cleared", false),
            Err(e) => self.notify(e.to_string(), true),
        }
    }

    fn parameter_row(&mut self, ui: &mut egui::Ui, id: ParamId) {
        let mut label = egui::RichText::new(self.session.label(id)).size(20.0).strong();
        if self.session.is_record_broken(id) {
            label = label.color(RECORD_BREAKING_COLOR);
        }
        ui.horizontal(|ui| {
            ui.label(label);
            if let Ok(param) = self.session.param(id) {
                ui.weak(format!("best {}", param.spec.format_value(param.best)));
            }
        });
        ui.horizontal(|ui| {
            if ui.button("-").clicked() {
                let _ = self.session.step(id, Direction::Down);
            }
            let mut fraction = self.session.fraction(id);
            if ui
                .add(egui::Slider::new(&mut fraction, 0.0..=1.0).show_value(false))
                .changed()
            {
                let _ = self.session.adjust_fraction(id, fraction);
            }
            if ui.button("+").clicked() {
                let _ = self.session.step(id, Direction::Up);
            }
        });
    }

    fn show(&mut self, ctx: &egui::Context) {
        // Menu files dropped onto the window replace the catalog
        for file in ctx.input(|i| i.raw.dropped_files.clone()) {
            let Some(path) = file.path else {
                continue;
            };
            let is_txt = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("txt"))
                .unwrap_or(false);
            if is_txt {
                self.load_menu(path);
            }
        }

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open Menu...").clicked() {
                        if let Some(path) = FileDialog::new().add_filter("Menu", &["txt"]).pick_file() {
                            self.load_menu(path);
                        }
                        ui.close_menu();
                    }
                    if ui.button("Reload Menu").clicked() {
                        self.load_menu(self.settings.menu_path());
                        ui.close_menu();
                    }
                });
                ui.menu_button("History", |ui| {
                    if ui.button("Forget Selected Exercise").clicked() {
                        self.forget_selected();
                        ui.close_menu();
                    }
                    if ui.button("Clear All").clicked() {
                        self.clear_history();
                        ui.close_menu();
                    }
                });
            });
        });

        egui::SidePanel::left("menu_panel").show(ctx, |ui| {
            ui.heading("📋 Training Menu");
            ui.separator();
            let names = self.session.display_names();
            if names.is_empty() {
                ui.label("No exercises on the menu");
                ui.label(format!("Add lines to {}", self.settings.menu_path().display()));
            }
            let mut clicked = None;
            egui::ScrollArea::vertical().show(ui, |ui| {
                for (i, name) in names.iter().enumerate() {
                    let selected = self
                        .session
                        .selection()
                        .map_or(false, |s| &s.display_name == name);
                    let mut response = ui.selectable_label(selected, name);
                    if let Some(r) = self.session.history().get_last(name) {
                        if r.best_a > 0.0 || r.best_b > 0.0 {
                            response = response
                                .on_hover_text(format!("best {} / {}", r.best_a, r.best_b));
                        }
                    }
                    if response.clicked() {
                        clicked = Some(i);
                    }
                }
            });
            if let Some(i) = clicked {
                self.choose(i);
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let has_selection = self.session.selection().is_some();
            ui.add_enabled_ui(has_selection, |ui| {
                for id in ParamId::ALL {
                    self.parameter_row(ui, id);
                    ui.add_space(8.0);
                }
            });

            ui.horizontal(|ui| {
                let exercise = egui::Button::new(
                    egui::RichText::new("📝 Exercise").color(egui::Color32::WHITE),
                )
                .fill(EXERCISE_BUTTON_COLOR);
                if ui.add_enabled(has_selection, exercise).clicked() {
                    self.output_exercise();
                }
                let can_record = self.session.can_record();
                let mut record = egui::Button::new(
                    egui::RichText::new("💪 Record").color(egui::Color32::WHITE),
                );
                if can_record {
                    record = record.fill(RECORD_BUTTON_COLOR);
                }
                if ui.add_enabled(can_record, record).clicked() {
                    self.output_record();
                }
            });

            ui.separator();
            ui.horizontal(|ui| {
                ui.label("Log");
                if ui.button("Copy").clicked() {
                    let text = self.output.clone();
                    ui.output_mut(|o| o.copied_text = text);
                    self.notify("Log copied", false);
                }
                if ui.button("Clear").clicked() {
                    self.output.clear();
                }
            });
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.add(
                    egui::TextEdit::multiline(&mut self.output)
                        .desired_rows(10)
                        .desired_width(f32::INFINITY)
                        .code_editor(),
                );
            });
        });

        if let Some(toast) = &self.toast {
            if toast.start.elapsed() < TOAST_DURATION {
                let mut text = egui::RichText::new(&toast.message);
                if toast.is_error {
                    text = text.color(RECORD_BREAKING_COLOR);
                }
                egui::Area::new(egui::Id::new("toast"))
                    .anchor(egui::Align2::RIGHT_TOP, [-10.0, 30.0])
                    .show(ctx, |ui| {
                        egui::Frame::popup(ui.style()).show(ui, |ui| {
                            ui.label(text);
                        });
                    });
                ctx.request_repaint_after(TOAST_DURATION);
            } else {
                self.toast = None;
            }
        }

        if self.settings_dirty {
            self.settings.save();
            self.settings_dirty = false;
        }
    }
}

impl App for PadApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.show(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.settings.last_exercise = self.session.selected_name().map(str::to_string);
        self.settings.save();
    }
}

fn main() -> eframe::Result<()> {
    env_logger::init();
    let options = NativeOptions::default();
    eframe::run_native(
        "Training Record Pad",
        options,
        Box::new(|_cc| Box::new(PadApp::default())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::tests::ENV_MUTEX;
    use std::env;

    struct ConfigHome {
        prev: Option<std::ffi::OsString>,
    }

    impl ConfigHome {
        fn set(dir: &std::path::Path) -> Self {
            let prev = env::var_os("XDG_CONFIG_HOME");
            unsafe {
                env::set_var("XDG_CONFIG_HOME", dir);
                env::remove_var(settings::MENU_ENV);
                env::remove_var(settings::HISTORY_ENV);
            }
            Self { prev }
        }
    }

    impl Drop for ConfigHome {
        fn drop(&mut self) {
            unsafe {
                match self.prev.take() {
                    Some(val) => env::set_var("XDG_CONFIG_HOME", val),
                    None => env::remove_var("XDG_CONFIG_HOME"),
                }
            }
        }
    }

    fn settings_in(dir: &std::path::Path) -> Settings {
        Settings {
            menu_file: dir.join("menu.txt"),
            history_file: dir.join("history_data.json"),
            ..Settings::default()
        }
    }

    #[test]
    fn seeds_default_menu_and_selects_first_exercise() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let _home = ConfigHome::set(dir.path());

        let app = PadApp::new(settings_in(dir.path()));
        assert!(dir.path().join("menu.txt").exists());
        assert_eq!(app.session.selected_name(), Some("Bench Press"));
    }

    #[test]
    fn missing_menu_without_seeding_gives_empty_list() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let _home = ConfigHome::set(dir.path());

        let mut settings = settings_in(dir.path());
        settings.seed_default_menu = false;
        let mut app = PadApp::new(settings);
        assert!(app.session.display_names().is_empty());
        assert!(app.session.selection().is_none());

        app.output_record();
        assert!(app.output.is_empty());
        assert!(app.toast.as_ref().unwrap().is_error);
    }

    #[test]
    fn record_appends_line_and_persists() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let _home = ConfigHome::set(dir.path());
        std::fs::write(dir.path().join("menu.txt"), "Bench,Chest,kg,2.5,reps,1,150,30\n").unwrap();

        let mut app = PadApp::new(settings_in(dir.path()));
        app.output_exercise();
        assert_eq!(app.output, "- (Chest) Bench\n");

        app.output_record();
        let toast = app.toast.as_ref().unwrap();
        assert!(toast.is_error);
        assert_eq!(app.output, "- (Chest) Bench\n");

        app.session.adjust_fraction(ParamId::A, 0.5).unwrap();
        app.session.step(ParamId::B, Direction::Up).unwrap();
        app.output_record();
        assert_eq!(app.output, "- (Chest) Bench\n  - 75.0 kg, 1 reps\n");
        let toast = app.toast.as_ref().unwrap();
        assert!(!toast.is_error);
        assert_eq!(toast.message, "New personal record! Congratulations!");

        let stored = HistoryStore::read(dir.path().join("history_data.json"))
            .unwrap()
            .unwrap();
        assert_eq!(stored["Bench"].best_a, 75.0);
    }

    #[test]
    fn choosing_an_exercise_is_remembered() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let _home = ConfigHome::set(dir.path());

        let mut app = PadApp::new(settings_in(dir.path()));
        app.choose(2);
        let chosen = app.session.selected_name().map(str::to_string);
        assert!(app.settings_dirty);

        let ctx = egui::Context::default();
        let _ = ctx.run(Default::default(), |ctx| app.show(ctx));
        assert!(!app.settings_dirty);

        let reopened = PadApp::new(Settings::load());
        assert_eq!(reopened.session.selected_name().map(str::to_string), chosen);
    }

    #[test]
    fn corrupt_history_is_reported() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let _home = ConfigHome::set(dir.path());
        std::fs::write(dir.path().join("history_data.json"), "[1, 2").unwrap();

        let app = PadApp::new(settings_in(dir.path()));
        let toast = app.toast.as_ref().unwrap();
        assert!(toast.is_error);
        assert!(toast.message.contains("history_data.json"));
        assert!(app.session.selection().is_some());
    }

    #[test]
    fn loading_a_bad_menu_path_keeps_current_menu() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let _home = ConfigHome::set(dir.path());

        let mut app = PadApp::new(settings_in(dir.path()));
        let before = app.session.display_names();
        app.load_menu(dir.path().join("nope.txt"));
        assert_eq!(app.session.display_names(), before);
        assert!(app.toast.as_ref().unwrap().is_error);

        let other = dir.path().join("other.txt");
        std::fs::write(&other, "Plank,Abs,sec,5,sets,1,300,10\nbroken\n").unwrap();
        app.load_menu(other.clone());
        assert_eq!(app.session.selected_name(), Some("Plank"));
        assert_eq!(app.settings.menu_file, other);
        assert!(app.toast.as_ref().unwrap().message.contains("1 lines skipped"));
    }
}
