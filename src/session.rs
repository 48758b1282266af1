//! Selection and recording state for the exercise currently on screen.

use std::rc::Rc;

use crate::history::{HistoryError, HistoryStore};
use crate::menu::{MenuCatalog, ParamId, ParameterSpec};
use crate::quantize::Direction;

/// Working value of one parameter together with its stored best.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamState {
    pub spec: ParameterSpec,
    pub value: f64,
    pub best: f64,
}

impl ParamState {
    /// Current value beats the stored best.
    pub fn is_record_broken(&self) -> bool {
        self.value > self.best
    }

    fn blocks_recording(&self) -> bool {
        self.spec.is_gating() && self.value == 0.0
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.spec.format_value(self.value), self.spec.unit)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub name: String,
    pub display_name: String,
    params: [ParamState; 2],
}

impl Selection {
    pub fn param(&self, id: ParamId) -> &ParamState {
        &self.params[id.index()]
    }

    fn param_mut(&mut self, id: ParamId) -> &mut ParamState {
        &mut self.params[id.index()]
    }
}

/// Outcome of a successful [`Session::commit`].
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    /// Line to insert into the log, e.g. `"  - 75.0 kg, 10 reps\n"`.
    pub text: String,
    pub new_record: bool,
    /// False when the history file could not be written.
    pub saved: bool,
}

impl Commit {
    pub fn message(&self) -> &'static str {
        match (self.new_record, self.saved) {
            (_, false) => "Recorded, but the history could not be saved",
            (true, true) => "New personal record! Congratulations!",
            (false, true) => "Great work! Set recorded.",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    NoSelection,
    UnknownExercise(String),
    ZeroValueRejected(ParamId),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::NoSelection => write!(f, "Select an exercise first"),
            SessionError::UnknownExercise(name) => write!(f, "Unknown exercise: {name}"),
            SessionError::ZeroValueRejected(id) => {
                write!(f, "Cannot record while {id} is 0")
            }
        }
    }
}

impl std::error::Error for SessionError {}

pub struct Session {
    catalog: Rc<MenuCatalog>,
    history: HistoryStore,
    selection: Option<Selection>,
}

impl Session {
    /// `history` must resolve names against the same `catalog`.
    pub fn new(catalog: Rc<MenuCatalog>, history: HistoryStore) -> Self {
        Self {
            catalog,
            history,
            selection: None,
        }
    }

    pub fn catalog(&self) -> &MenuCatalog {
        &self.catalog
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn display_names(&self) -> Vec<String> {
        self.catalog.display_names()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn selected_name(&self) -> Option<&str> {
        self.selection.as_ref().map(|s| s.name.as_str())
    }

    /// Select an exercise by bare name or display name.
    ///
    /// Any uncommitted edits of the previous selection are dropped. On an
    /// unknown name the current selection is left untouched.
    pub fn select(&mut self, input: &str) -> Result<(), SessionError> {
        let Some(exercise) = self.catalog.get(input) else {
            log::warn!("Cannot select {input:?}: not on the menu");
            return Err(SessionError::UnknownExercise(input.to_string()));
        };
        let record = self.history.get_last(&exercise.name).unwrap_or_default();
        let params = ParamId::ALL.map(|id| {
            let spec = exercise.param(id).clone();
            ParamState {
                value: spec.snap(record.last(id)),
                best: record.best(id),
                spec,
            }
        });
        log::debug!("Selected {}", exercise.name);
        self.selection = Some(Selection {
            name: exercise.name.clone(),
            display_name: exercise.display_name(),
            params,
        });
        Ok(())
    }

    pub fn select_index(&mut self, index: usize) -> Result<(), SessionError> {
        let name = self
            .catalog
            .at(index)
            .map(|e| e.name.clone())
            .ok_or_else(|| SessionError::UnknownExercise(format!("#{index}")))?;
        self.select(&name)
    }

    /// Set a parameter to `value`, snapped to its step grid and clamped to
    /// `[0, max]`. Nothing is persisted until [`Session::commit`].
    pub fn adjust(&mut self, id: ParamId, value: f64) -> Result<f64, SessionError> {
        let param = self
            .selection
            .as_mut()
            .ok_or(SessionError::NoSelection)?
            .param_mut(id);
        param.value = param.spec.snap(value);
        Ok(param.value)
    }

    /// Slider input: `fraction` is the raw control position in `[0, 1]`.
    pub fn adjust_fraction(&mut self, id: ParamId, fraction: f64) -> Result<f64, SessionError> {
        let value = self.param(id)?.spec.value_at(fraction);
        self.adjust(id, value)
    }

    /// Stepper input.
    pub fn step(&mut self, id: ParamId, direction: Direction) -> Result<f64, SessionError> {
        let param = self.param(id)?;
        let value = param.spec.nudge(param.value, direction);
        self.adjust(id, value)
    }

    pub fn param(&self, id: ParamId) -> Result<&ParamState, SessionError> {
        self.selection
            .as_ref()
            .map(|s| s.param(id))
            .ok_or(SessionError::NoSelection)
    }

    /// Slider position for the current value.
    pub fn fraction(&self, id: ParamId) -> f64 {
        self.param(id)
            .map(|p| p.spec.fraction_of(p.value))
            .unwrap_or(0.0)
    }

    pub fn label(&self, id: ParamId) -> String {
        self.param(id).map(ParamState::label).unwrap_or_default()
    }

    pub fn is_record_broken(&self, id: ParamId) -> bool {
        self.param(id).map(ParamState::is_record_broken).unwrap_or(false)
    }

    /// Whether [`Session::commit`] would accept the current values.
    pub fn can_record(&self) -> bool {
        self.selection
            .as_ref()
            .map(|s| !s.params.iter().any(ParamState::blocks_recording))
            .unwrap_or(false)
    }

    /// Record the current values.
    ///
    /// Rejected without any state change when a gating parameter is 0.
    pub fn commit(&mut self) -> Result<Commit, SessionError> {
        let selection = self.selection.as_mut().ok_or(SessionError::NoSelection)?;
        if let Some(id) = ParamId::ALL
            .into_iter()
            .find(|&id| selection.param(id).blocks_recording())
        {
            log::warn!("Refusing to record {}: {id} is 0", selection.name);
            return Err(SessionError::ZeroValueRejected(id));
        }

        let new_record = selection.params.iter().any(ParamState::is_record_broken);
        for param in &mut selection.params {
            param.best = param.best.max(param.value);
        }

        let [a, b] = &selection.params;
        let saved = match self.history.update(&selection.name, a.value, b.value) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Set for {} was not saved: {e}", selection.name);
                false
            }
        };
        let text = format!("  - {}, {}\n", a.label(), b.label());
        Ok(Commit {
            text,
            new_record,
            saved,
        })
    }

    /// The exercise heading line, e.g. `"- (Chest) Bench Press\n"`.
    pub fn exercise_line(&self) -> Result<String, SessionError> {
        self.selection
            .as_ref()
            .map(|s| format!("- {}\n", s.display_name))
            .ok_or(SessionError::NoSelection)
    }

    /// Drop the stored history of the selected exercise.
    pub fn forget_selected(&mut self) -> Result<(), HistoryError> {
        let Some(name) = self.selected_name().map(str::to_string) else {
            return Ok(());
        };
        self.history.remove(&name)?;
        self.reset_bests();
        Ok(())
    }

    pub fn clear_history(&mut self) -> Result<(), HistoryError> {
        self.history.clear()?;
        self.reset_bests();
        Ok(())
    }

    fn reset_bests(&mut self) {
        if let Some(selection) = self.selection.as_mut() {
            for param in &mut selection.params {
                param.best = 0.0;
            }
        }
    }

    /// Swap in a freshly loaded catalog and restore the selection if the
    /// exercise still exists.
    pub fn reload_catalog(&mut self, catalog: Rc<MenuCatalog>) {
        let previous = self.selection.take().map(|s| s.name);
        self.history.set_catalog(Rc::clone(&catalog));
        self.catalog = catalog;
        if let Some(name) = previous {
            let _ = self.select(&name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const MENU: &str = "Bench,Chest,kg,2.5,reps,1,150,30\n\
                        Running,Cardio,km,0.1,min,0,42,180\n";

    fn session_at(path: &Path) -> Session {
        let catalog = Rc::new(MenuCatalog::from_reader(MENU.as_bytes()));
        let history = HistoryStore::open(path, Rc::clone(&catalog));
        Session::new(catalog, history)
    }

    #[test]
    fn bench_walkthrough() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_at(&dir.path().join("h.json"));

        session.select("Bench").unwrap();
        let sel = session.selection().unwrap();
        assert_eq!(sel.param(ParamId::A).value, 0.0);
        assert_eq!(sel.param(ParamId::B).value, 0.0);
        assert_eq!(sel.param(ParamId::A).best, 0.0);
        assert_eq!(sel.param(ParamId::B).best, 0.0);

        assert_eq!(session.adjust_fraction(ParamId::A, 0.5).unwrap(), 75.0);
        assert!(!session.can_record());
        assert_eq!(
            session.commit(),
            Err(SessionError::ZeroValueRejected(ParamId::B))
        );
        assert_eq!(session.history().get_last("Bench").unwrap().last_a, 0.0);
        assert!(!session.history().path().exists());
    }

    #[test]
    fn zero_gating_parameter_always_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_at(&dir.path().join("h.json"));
        session.select("Bench").unwrap();
        session.adjust(ParamId::B, 10.0).unwrap();
        assert_eq!(
            session.commit(),
            Err(SessionError::ZeroValueRejected(ParamId::A))
        );
        assert_eq!(session.param(ParamId::A).unwrap().best, 0.0);
    }

    #[test]
    fn zero_is_fine_for_non_gating_parameter() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_at(&dir.path().join("h.json"));
        session.select("(Cardio) Running").unwrap();
        session.adjust(ParamId::A, 5.0).unwrap();
        assert!(session.can_record());
        let commit = session.commit().unwrap();
        assert_eq!(commit.text, "  - 5.0 km, 0 min\n");
        assert!(commit.saved);
    }

    #[test]
    fn continuous_value_is_stored_as_shown() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_at(&dir.path().join("h.json"));
        session.select("Running").unwrap();
        session.adjust(ParamId::A, 5.0).unwrap();
        // 0.137 * 180 = 24.66
        assert_eq!(session.adjust_fraction(ParamId::B, 0.137).unwrap(), 25.0);

        let commit = session.commit().unwrap();
        assert_eq!(commit.text, "  - 5.0 km, 25 min\n");
        let r = session.history().get_last("Running").unwrap();
        assert_eq!((r.last_a, r.last_b, r.best_b), (5.0, 25.0, 25.0));
    }

    #[test]
    fn unsaved_commit_still_emits_text() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the history file should be makes every write fail.
        let path = dir.path().join("h.json");
        std::fs::create_dir(&path).unwrap();
        let mut session = session_at(&path);
        session.select("Bench").unwrap();
        session.adjust(ParamId::A, 80.0).unwrap();
        session.adjust(ParamId::B, 5.0).unwrap();

        let commit = session.commit().unwrap();
        assert!(!commit.saved);
        assert!(commit.new_record);
        assert_eq!(commit.text, "  - 80.0 kg, 5 reps\n");
        assert_eq!(
            commit.message(),
            "Recorded, but the history could not be saved"
        );
        assert_eq!(session.param(ParamId::A).unwrap().best, 80.0);
        assert_eq!(session.param(ParamId::B).unwrap().best, 5.0);
        assert_eq!(session.history().get_last("Bench").unwrap().last_a, 80.0);
        assert!(path.is_dir());
    }

    #[test]
    fn commit_writes_history_and_flags_new_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");
        let mut session = session_at(&path);
        session.select("Bench").unwrap();
        session.adjust(ParamId::A, 80.0).unwrap();
        session.adjust(ParamId::B, 5.0).unwrap();
        assert!(session.is_record_broken(ParamId::A));

        let commit = session.commit().unwrap();
        assert_eq!(commit.text, "  - 80.0 kg, 5 reps\n");
        assert!(commit.new_record);
        assert!(!session.is_record_broken(ParamId::A));

        session.adjust(ParamId::A, 70.0).unwrap();
        let commit = session.commit().unwrap();
        assert!(!commit.new_record);
        assert_eq!(commit.message(), "Great work! Set recorded.");

        let reopened = session_at(&path);
        let r = reopened.history().get_last("Bench").unwrap();
        assert_eq!((r.last_a, r.last_b, r.best_a, r.best_b), (70.0, 5.0, 80.0, 5.0));
    }

    #[test]
    fn select_restores_last_values_and_discards_edits() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_at(&dir.path().join("h.json"));
        session.select("Bench").unwrap();
        session.adjust(ParamId::A, 60.0).unwrap();
        session.adjust(ParamId::B, 12.0).unwrap();
        session.commit().unwrap();

        session.adjust(ParamId::A, 100.0).unwrap();
        session.select("Running").unwrap();
        session.select("Bench").unwrap();
        assert_eq!(session.label(ParamId::A), "60.0 kg");
        assert_eq!(session.label(ParamId::B), "12 reps");
        assert_eq!(session.param(ParamId::A).unwrap().best, 60.0);
        assert!((session.fraction(ParamId::A) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn adjust_quantizes_and_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_at(&dir.path().join("h.json"));
        assert_eq!(session.adjust(ParamId::A, 10.0), Err(SessionError::NoSelection));

        session.select_index(0).unwrap();
        assert_eq!(session.adjust(ParamId::A, 76.0).unwrap(), 75.0);
        assert_eq!(session.adjust(ParamId::A, 999.0).unwrap(), 150.0);
        assert_eq!(session.adjust(ParamId::A, -5.0).unwrap(), 0.0);
        assert_eq!(session.step(ParamId::A, Direction::Down).unwrap(), 0.0);
        assert_eq!(session.step(ParamId::A, Direction::Up).unwrap(), 2.5);
        assert_eq!(session.step(ParamId::B, Direction::Up).unwrap(), 1.0);
    }

    #[test]
    fn unknown_selection_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_at(&dir.path().join("h.json"));
        session.select("Bench").unwrap();
        assert_eq!(
            session.select("Squat"),
            Err(SessionError::UnknownExercise("Squat".into()))
        );
        assert!(session.select_index(9).is_err());
        assert_eq!(session.selected_name(), Some("Bench"));
        assert_eq!(session.exercise_line().unwrap(), "- (Chest) Bench\n");
    }

    #[test]
    fn commit_without_selection_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_at(&dir.path().join("h.json"));
        assert_eq!(session.commit(), Err(SessionError::NoSelection));
        assert!(!session.can_record());
        assert_eq!(session.exercise_line(), Err(SessionError::NoSelection));
    }

    #[test]
    fn clearing_history_resets_bests() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_at(&dir.path().join("h.json"));
        session.select("Bench").unwrap();
        session.adjust(ParamId::A, 50.0).unwrap();
        session.adjust(ParamId::B, 8.0).unwrap();
        session.commit().unwrap();

        session.forget_selected().unwrap();
        assert_eq!(session.param(ParamId::A).unwrap().best, 0.0);
        assert!(session.is_record_broken(ParamId::A));

        session.commit().unwrap();
        session.clear_history().unwrap();
        let on_disk = HistoryStore::read(session.history().path()).unwrap().unwrap();
        assert!(on_disk.is_empty());
        let r = session.history().get_last("Bench").unwrap();
        assert_eq!(r.best_a, 0.0);
    }

    #[test]
    fn reload_keeps_selection_when_possible() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_at(&dir.path().join("h.json"));
        session.select("Running").unwrap();

        let smaller = Rc::new(MenuCatalog::from_reader(
            "Running,Cardio,km,0.5,min,1,21,120\n".as_bytes(),
        ));
        session.reload_catalog(smaller);
        assert_eq!(session.selected_name(), Some("Running"));
        assert_eq!(session.param(ParamId::A).unwrap().spec.step, 0.5);

        session.reload_catalog(Rc::new(MenuCatalog::default()));
        assert!(session.selection().is_none());
        assert!(session.display_names().is_empty());
    }
}
