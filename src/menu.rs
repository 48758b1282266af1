use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::quantize::{self, Direction};

/// Maximum used when a catalog line omits the two max fields.
pub const DEFAULT_MAX: f64 = 200.0;

/// Menu written to disk when no catalog exists yet.
pub const DEFAULT_MENU: &str = include_str!("../data/default_menu.txt");

/// Identifies one of the two parameters every exercise carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    A,
    B,
}

impl ParamId {
    pub const ALL: [ParamId; 2] = [ParamId::A, ParamId::B];

    pub fn index(self) -> usize {
        match self {
            ParamId::A => 0,
            ParamId::B => 1,
        }
    }
}

impl std::fmt::Display for ParamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamId::A => write!(f, "parameter A"),
            ParamId::B => write!(f, "parameter B"),
        }
    }
}

/// Unit, step and bound of a single exercise parameter.
///
/// A `step` of zero marks the parameter as continuous. Such a parameter does
/// not gate recording, so zero is a legitimate value for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub unit: String,
    pub step: f64,
    pub max: f64,
    /// Decimal digits implied by the step as written in the catalog.
    pub precision: u32,
}

impl ParameterSpec {
    pub fn new(unit: impl Into<String>, step: f64, max: f64, precision: u32) -> Self {
        Self {
            unit: unit.into(),
            step,
            max,
            precision,
        }
    }

    /// Whether a zero value blocks recording.
    pub fn is_gating(&self) -> bool {
        self.step != 0.0
    }

    pub fn value_at(&self, fraction: f64) -> f64 {
        quantize::to_value(fraction, 0.0, self.max, self.step, self.precision)
    }

    pub fn fraction_of(&self, value: f64) -> f64 {
        quantize::to_fraction(value, 0.0, self.max)
    }

    /// Bring an arbitrary value onto this parameter's grid inside `[0, max]`.
    pub fn snap(&self, value: f64) -> f64 {
        let clamped = quantize::step_value(value, 0.0, 0.0, self.max);
        self.value_at(self.fraction_of(clamped))
    }

    /// One stepper press away from `value`, clamped to `[0, max]`.
    pub fn nudge(&self, value: f64, direction: Direction) -> f64 {
        let next = quantize::step_value(
            self.snap(value),
            direction.delta(self.step),
            0.0,
            self.max,
        );
        quantize::round_to(next, self.precision)
    }

    /// Format with the step's precision. Past the first decimal, trailing
    /// zeros are dropped, so a `0.25` step shows `1.5` rather than `1.50`.
    pub fn format_value(&self, value: f64) -> String {
        let text = format!("{:.*}", self.precision as usize, value);
        if self.precision <= 1 {
            return text;
        }
        let trimmed = text.trim_end_matches('0');
        if trimmed.ends_with('.') {
            format!("{trimmed}0")
        } else {
            trimmed.to_string()
        }
    }
}

/// A single entry of the training menu.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseDefinition {
    pub name: String,
    pub target: String,
    pub param_a: ParameterSpec,
    pub param_b: ParameterSpec,
}

impl ExerciseDefinition {
    pub fn param(&self, id: ParamId) -> &ParameterSpec {
        match id {
            ParamId::A => &self.param_a,
            ParamId::B => &self.param_b,
        }
    }

    /// Label shown in the menu list, e.g. `(Chest) Bench Press`.
    pub fn display_name(&self) -> String {
        format!("({}) {}", self.target, self.name)
    }
}

#[derive(Debug)]
pub enum CatalogError {
    Missing(PathBuf),
    Unreadable(PathBuf, io::Error),
    Malformed { line: u64, reason: String },
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Missing(path) => write!(f, "menu file {} does not exist", path.display()),
            CatalogError::Unreadable(path, e) => {
                write!(f, "failed to read menu file {}: {e}", path.display())
            }
            CatalogError::Malformed { line, reason } => write!(f, "line {line}: {reason}"),
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Unreadable(_, e) => Some(e),
            CatalogError::Missing(_) | CatalogError::Malformed { .. } => None,
        }
    }
}

/// Exercises available for selection, in file order.
#[derive(Debug, Default)]
pub struct MenuCatalog {
    exercises: Vec<ExerciseDefinition>,
    index: HashMap<String, usize>,
    skipped: Vec<CatalogError>,
}

impl MenuCatalog {
    /// Parse the catalog at `path`.
    ///
    /// Malformed lines are skipped and reported through [`MenuCatalog::skipped`];
    /// only a missing or unopenable file is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CatalogError::Missing(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)
            .map_err(|e| CatalogError::Unreadable(path.to_path_buf(), e))?;
        let catalog = Self::from_reader(file);
        log::info!(
            "Loaded {} exercises from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Like [`MenuCatalog::load`] but degrades to an empty catalog.
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(catalog) => catalog,
            Err(e) => {
                log::warn!("Continuing with an empty menu: {e}");
                Self::default()
            }
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> Self {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);
        let mut catalog = Self::default();
        for result in rdr.records() {
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    if e.is_io_error() {
                        log::warn!("Stopped reading menu at line {line}: {e}");
                        break;
                    }
                    catalog.skip(line, e.to_string());
                    continue;
                }
            };
            if record.iter().all(str::is_empty) {
                continue;
            }
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            match parse_exercise(&record) {
                Ok(exercise) => catalog.insert(exercise),
                Err(reason) => catalog.skip(line, reason),
            }
        }
        catalog
    }

    fn skip(&mut self, line: u64, reason: String) {
        let err = CatalogError::Malformed { line, reason };
        log::warn!("Skipping menu entry, {err}");
        self.skipped.push(err);
    }

    fn insert(&mut self, exercise: ExerciseDefinition) {
        match self.index.get(&exercise.name) {
            Some(&i) => {
                log::warn!("Duplicate menu entry {:?}, keeping the later one", exercise.name);
                self.exercises[i] = exercise;
            }
            None => {
                self.index.insert(exercise.name.clone(), self.exercises.len());
                self.exercises.push(exercise);
            }
        }
    }

    /// Lines that could not be parsed.
    pub fn skipped(&self) -> &[CatalogError] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExerciseDefinition> {
        self.exercises.iter()
    }

    pub fn display_names(&self) -> Vec<String> {
        self.iter().map(ExerciseDefinition::display_name).collect()
    }

    pub fn at(&self, index: usize) -> Option<&ExerciseDefinition> {
        self.exercises.get(index)
    }

    /// Resolve a bare name or a `(target) name` display string to the
    /// canonical exercise name.
    pub fn find_by_tag_or_name(&self, input: &str) -> Option<&str> {
        if input.is_empty() {
            return None;
        }
        if let Some(&i) = self.index.get(input) {
            return Some(self.exercises[i].name.as_str());
        }
        let (_, name) = input.strip_prefix('(')?.split_once(") ")?;
        self.index.get(name).map(|&i| self.exercises[i].name.as_str())
    }

    pub fn get(&self, input: &str) -> Option<&ExerciseDefinition> {
        let name = self.find_by_tag_or_name(input)?;
        self.index.get(name).map(|&i| &self.exercises[i])
    }
}

fn parse_exercise(record: &StringRecord) -> Result<ExerciseDefinition, String> {
    if record.len() != 6 && record.len() != 8 {
        return Err(format!("expected 6 or 8 fields, found {}", record.len()));
    }
    let name = &record[0];
    if name.is_empty() {
        return Err("exercise name is empty".into());
    }
    let (max_a, max_b) = if record.len() == 8 {
        (parse_max(&record[6])?, parse_max(&record[7])?)
    } else {
        (DEFAULT_MAX, DEFAULT_MAX)
    };
    Ok(ExerciseDefinition {
        name: name.to_string(),
        target: record[1].to_string(),
        param_a: parse_param(&record[2], &record[3], max_a)?,
        param_b: parse_param(&record[4], &record[5], max_b)?,
    })
}

fn parse_param(unit: &str, step: &str, max: f64) -> Result<ParameterSpec, String> {
    let value: f64 = step
        .parse()
        .map_err(|_| format!("step {step:?} is not a number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("step {step:?} must be zero or positive"));
    }
    if value > max {
        return Err(format!("step {step:?} is larger than max {max}"));
    }
    Ok(ParameterSpec::new(unit, value, max, quantize::decimals_of(step)))
}

fn parse_max(text: &str) -> Result<f64, String> {
    let value: f64 = text
        .parse()
        .map_err(|_| format!("max {text:?} is not a number"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("max {text:?} must be positive"));
    }
    Ok(value)
}

/// Seed `path` with the bundled menu.
pub fn write_default_menu<P: AsRef<Path>>(path: P) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, DEFAULT_MENU)
}
