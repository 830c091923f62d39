use std::collections::BTreeMap;
use std::ffi::OsString;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A single option value as supplied by the host UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Named, solver-specific options for one run.
///
/// Options left out take the solver's declared default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the set with `name` set to `value`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Returns the value supplied for `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Iterates over the supplied option names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Type, default and valid range of one option.
#[derive(Debug, Clone, Copy)]
pub enum OptionKind {
    Int {
        min: i64,
        max: i64,
        default: Option<i64>,
    },
    Float {
        min: f64,
        max: f64,
        default: Option<f64>,
    },
    Bool { default: Option<bool> },
    Choice {
        choices: &'static [&'static str],
        default: Option<&'static str>,
    },
}

/// How an option is rendered on the solver command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagStyle {
    /// `<flag> <value>`.
    Value,
    /// `<flag> true|false`.
    BoolValue,
    /// `<flag>` present only when the option is true.
    Switch,
    /// `<flag>` present only when the option is false.
    SwitchWhenFalse,
}

/// Declaration of one recognized solver option.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    /// Option name as used in a [`ParameterSet`].
    pub name: &'static str,
    /// Command-line flag documented by the solver.
    pub flag: &'static str,
    pub kind: OptionKind,
    pub style: FlagStyle,
}

/// A validated option value.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Int(i64),
    Float(f64),
    Bool(bool),
    Choice(&'static str),
}

impl Resolved {
    fn render(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Bool(v) => v.to_string(),
            Self::Choice(v) => (*v).to_string(),
        }
    }
}

/// A [`ParameterSet`] checked against an option table, with defaults filled in.
#[derive(Debug, Clone)]
pub struct ResolvedParams {
    entries: Vec<(&'static OptionSpec, Resolved)>,
}

impl ResolvedParams {
    /// Validates `params` against `table`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for unknown, missing, mistyped or
    /// out-of-range options.
    pub fn resolve(
        solver: &'static str,
        table: &'static [OptionSpec],
        params: &ParameterSet,
    ) -> Result<Self, ConfigError> {
        if let Some(unknown) = params.names().find(|n| !table.iter().any(|s| s.name == *n)) {
            return Err(ConfigError::UnknownOption {
                solver,
                option: unknown.to_string(),
            });
        }

        let entries = table
            .iter()
            .map(|spec| resolve_one(solver, spec, params.get(spec.name)).map(|v| (spec, v)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Returns the resolved value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Resolved> {
        self.entries
            .iter()
            .find(|(spec, _)| spec.name == name)
            .map(|(_, v)| v)
    }

    /// Renders all options in table order as command-line arguments.
    #[must_use]
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args = Vec::new();
        for (spec, value) in &self.entries {
            let flag = OsString::from(spec.flag);
            match (spec.style, value) {
                (FlagStyle::Value | FlagStyle::BoolValue, v) => {
                    args.push(flag);
                    args.push(v.render().into());
                }
                (FlagStyle::Switch, Resolved::Bool(true))
                | (FlagStyle::SwitchWhenFalse, Resolved::Bool(false)) => args.push(flag),
                (FlagStyle::Switch | FlagStyle::SwitchWhenFalse, _) => {}
            }
        }
        args
    }
}

#[allow(clippy::cast_precision_loss)]
fn resolve_one(
    solver: &'static str,
    spec: &OptionSpec,
    value: Option<&ParamValue>,
) -> Result<Resolved, ConfigError> {
    let option = spec.name;
    let missing = || ConfigError::MissingOption { solver, option };
    let mismatch = |expected| ConfigError::TypeMismatch { option, expected };

    match spec.kind {
        OptionKind::Int { min, max, default } => {
            let v = match value {
                None => default.ok_or_else(missing)?,
                Some(ParamValue::Int(v)) => *v,
                Some(_) => return Err(mismatch("an integer")),
            };
            if v < min || v > max {
                return Err(ConfigError::OutOfRange {
                    option,
                    value: v as f64,
                    min: min as f64,
                    max: max as f64,
                });
            }
            Ok(Resolved::Int(v))
        }
        OptionKind::Float { min, max, default } => {
            let v = match value {
                None => default.ok_or_else(missing)?,
                Some(ParamValue::Float(v)) => *v,
                Some(ParamValue::Int(v)) => *v as f64,
                Some(_) => return Err(mismatch("a number")),
            };
            if !(min..=max).contains(&v) {
                return Err(ConfigError::OutOfRange {
                    option,
                    value: v,
                    min,
                    max,
                });
            }
            Ok(Resolved::Float(v))
        }
        OptionKind::Bool { default } => match value {
            None => default.map(Resolved::Bool).ok_or_else(missing),
            Some(ParamValue::Bool(v)) => Ok(Resolved::Bool(*v)),
            Some(_) => Err(mismatch("a boolean")),
        },
        OptionKind::Choice { choices, default } => {
            let v = match value {
                None => default.ok_or_else(missing)?,
                Some(ParamValue::Text(text)) => choices
                    .iter()
                    .copied()
                    .find(|c| c.eq_ignore_ascii_case(text))
                    .ok_or_else(|| ConfigError::InvalidChoice {
                        option,
                        value: text.clone(),
                        choices,
                    })?,
                Some(_) => return Err(mismatch("a string")),
            };
            Ok(Resolved::Choice(v))
        }
    }
}
