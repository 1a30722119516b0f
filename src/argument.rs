use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Boolean arguments only accept these two tokens.
pub const BOOL_TRUE: &str = "True";
pub const BOOL_FALSE: &str = "False";

/// Separator used to store multi-value arguments in a single `Value`.
pub const MULTI_VALUE_DELIMITER: char = ';';

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

/// Parsed form of an argument's `Type` string.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentType {
    String,
    Password,
    Path,
    File,
    Bool,
    Int { range: Option<(i64, i64)> },
    Float { range: Option<(f64, f64)> },
    Selection(Vec<String>),
}

impl ArgumentType {
    /// Checks a single (already split) value against the type.
    pub fn check(&self, value: &str) -> Result<(), ValidationError> {
        match self {
            ArgumentType::String
            | ArgumentType::Password
            | ArgumentType::Path
            | ArgumentType::File => Ok(()),
            ArgumentType::Bool => {
                if value == BOOL_TRUE || value == BOOL_FALSE {
                    Ok(())
                } else {
                    Err(ValidationError::NotABool {
                        value: value.to_string(),
                    })
                }
            }
            ArgumentType::Int { range } => {
                let parsed: i64 = value.trim().parse().map_err(|_| ValidationError::NotAnInteger {
                    value: value.to_string(),
                })?;
                match range {
                    Some((min, max)) if parsed < *min || parsed > *max => {
                        Err(ValidationError::OutOfRange {
                            value: value.to_string(),
                            min: min.to_string(),
                            max: max.to_string(),
                        })
                    }
                    _ => Ok(()),
                }
            }
            ArgumentType::Float { range } => {
                let parsed: f64 = value
                    .trim()
                    .parse()
                    .ok()
                    .filter(|number: &f64| number.is_finite())
                    .ok_or_else(|| ValidationError::NotAFloat {
                        value: value.to_string(),
                    })?;
                match range {
                    Some((min, max)) if parsed < *min || parsed > *max => {
                        Err(ValidationError::OutOfRange {
                            value: value.to_string(),
                            min: format!("{min:?}"),
                            max: format!("{max:?}"),
                        })
                    }
                    _ => Ok(()),
                }
            }
            ArgumentType::Selection(choices) => {
                if choices.iter().any(|choice| choice == value) {
                    Ok(())
                } else {
                    Err(ValidationError::NotAChoice {
                        value: value.to_string(),
                        choices: choices.clone(),
                    })
                }
            }
        }
    }
}

fn bracketed<'a>(raw: &'a str, keyword: &str) -> Option<&'a str> {
    raw.strip_prefix(keyword)?
        .strip_prefix('[')?
        .strip_suffix(']')
}

fn parse_bounds<T: FromStr>(raw: &str, inner: &str) -> Result<(T, T), ValidationError> {
    let unknown = || ValidationError::UnknownType(raw.to_string());
    let (min, max) = inner.split_once("..").ok_or_else(unknown)?;
    let min = min.trim().parse().map_err(|_| unknown())?;
    let max = max.trim().parse().map_err(|_| unknown())?;
    Ok((min, max))
}

impl FromStr for ArgumentType {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim();
        let parsed = match normalized {
            "string" => ArgumentType::String,
            "password" => ArgumentType::Password,
            "path" => ArgumentType::Path,
            "file" => ArgumentType::File,
            "bool" => ArgumentType::Bool,
            "int" => ArgumentType::Int { range: None },
            "float" => ArgumentType::Float { range: None },
            _ => {
                if let Some(inner) = bracketed(normalized, "int") {
                    ArgumentType::Int {
                        range: Some(parse_bounds(raw, inner)?),
                    }
                } else if let Some(inner) = bracketed(normalized, "float") {
                    ArgumentType::Float {
                        range: Some(parse_bounds(raw, inner)?),
                    }
                } else if let Some(inner) = bracketed(normalized, "selection") {
                    let choices: Vec<String> = inner
                        .split(',')
                        .map(|choice| choice.trim().to_string())
                        .filter(|choice| !choice.is_empty())
                        .collect();
                    if choices.is_empty() {
                        return Err(ValidationError::UnknownType(raw.to_string()));
                    }
                    ArgumentType::Selection(choices)
                } else {
                    return Err(ValidationError::UnknownType(raw.to_string()));
                }
            }
        };
        Ok(parsed)
    }
}

impl fmt::Display for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentType::String => write!(f, "string"),
            ArgumentType::Password => write!(f, "password"),
            ArgumentType::Path => write!(f, "path"),
            ArgumentType::File => write!(f, "file"),
            ArgumentType::Bool => write!(f, "bool"),
            ArgumentType::Int { range: None } => write!(f, "int"),
            ArgumentType::Int {
                range: Some((min, max)),
            } => write!(f, "int[{min}..{max}]"),
            ArgumentType::Float { range: None } => write!(f, "float"),
            ArgumentType::Float {
                range: Some((min, max)),
            } => write!(f, "float[{min:?}..{max:?}]"),
            ArgumentType::Selection(choices) => write!(f, "selection[{}]", choices.join(",")),
        }
    }
}

/// A single typed command-line option of an app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Argument {
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_human: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_mapping: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_multi: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Conditional requirement in the form `other=value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_on_argument: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_runtime_argument: bool,
    /// Last value rejected by validation. Never persisted.
    #[serde(skip)]
    pub rejection: Option<ValidationError>,
}

impl Argument {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            required: false,
            name_human: None,
            section: None,
            value: None,
            value_mapping: None,
            is_multi: false,
            description: None,
            required_on_argument: None,
            is_runtime_argument: false,
            rejection: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn human(mut self, name_human: impl Into<String>) -> Self {
        self.name_human = Some(name_human.into());
        self
    }

    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn multi(mut self) -> Self {
        self.is_multi = true;
        self
    }

    pub fn runtime(mut self) -> Self {
        self.is_runtime_argument = true;
        self
    }

    pub fn required_on(mut self, condition: impl Into<String>) -> Self {
        self.required_on_argument = Some(condition.into());
        self
    }

    /// Maps `True`/`False` onto `1`/`0` on the command line.
    pub fn bool_mapping(mut self) -> Self {
        self.value_mapping = Some(bool_value_mapping());
        self
    }

    pub fn argument_type(&self) -> Result<ArgumentType, ValidationError> {
        self.kind.parse()
    }

    pub fn display_name(&self) -> &str {
        match self.name_human.as_deref() {
            Some(human) if !human.is_empty() => human,
            _ => &self.name,
        }
    }

    /// True when the argument carries a non-blank value.
    pub fn is_set(&self) -> bool {
        self.value
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
    }

    /// The referenced argument and expected value of `RequiredOnArgument`.
    pub fn condition(&self) -> Option<(&str, &str)> {
        let raw = self.required_on_argument.as_deref()?;
        let (name, value) = raw.split_once('=')?;
        Some((name.trim(), value.trim()))
    }

    /// Individual values. Multi-value arguments are split on the internal delimiter.
    pub fn values(&self) -> Vec<String> {
        let Some(value) = self.value.as_deref() else {
            return Vec::new();
        };
        if self.is_multi {
            split_multi(value)
        } else if value.trim().is_empty() {
            Vec::new()
        } else {
            vec![value.to_string()]
        }
    }

    /// Values after `ValueMapping` has been applied.
    pub fn encoded_values(&self) -> Vec<String> {
        self.values()
            .into_iter()
            .map(|value| match &self.value_mapping {
                Some(mapping) => mapping.get(&value).cloned().unwrap_or(value),
                None => value,
            })
            .collect()
    }

    /// Checks a candidate value against the declared type without storing it.
    pub fn check(&self, candidate: Option<&str>) -> Result<(), ValidationError> {
        let kind = self.argument_type()?;
        let Some(candidate) = candidate else {
            return Ok(());
        };
        if self.is_multi {
            for value in split_multi(candidate) {
                kind.check(&value)?;
            }
            Ok(())
        } else if candidate.trim().is_empty() {
            Ok(())
        } else {
            kind.check(candidate)
        }
    }

    /// Re-validates the current value, recording a rejection on failure.
    pub fn validate_type(&mut self) -> Result<(), ValidationError> {
        match self.check(self.value.as_deref()) {
            Ok(()) => {
                self.rejection = None;
                Ok(())
            }
            Err(err) => {
                self.rejection = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Stores `value` only if it satisfies the declared type.
    pub fn set_value(&mut self, value: Option<String>) -> Result<(), ValidationError> {
        if let Err(err) = self.check(value.as_deref()) {
            self.rejection = Some(err.clone());
            return Err(err);
        }
        self.rejection = None;
        self.value = value.filter(|value| !value.is_empty());
        Ok(())
    }

    /// Stores a list of values for a multi-value argument.
    pub fn set_values<I, S>(&mut self, values: I) -> Result<(), ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = join_multi(values);
        self.set_value(if joined.is_empty() { None } else { Some(joined) })
    }
}

pub fn bool_value_mapping() -> IndexMap<String, String> {
    IndexMap::from([
        (BOOL_TRUE.to_string(), "1".to_string()),
        (BOOL_FALSE.to_string(), "0".to_string()),
    ])
}

pub fn split_multi(raw: &str) -> Vec<String> {
    raw.split(MULTI_VALUE_DELIMITER)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_multi<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut joined = String::new();
    for value in values {
        let value = value.as_ref().trim();
        if value.is_empty() {
            continue;
        }
        if !joined.is_empty() {
            joined.push(MULTI_VALUE_DELIMITER);
        }
        joined.push_str(value);
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_int_accepts_only_values_in_range() {
        let mut argument = Argument::new("RG", "int[0..2]");
        for accepted in ["0", "1", "2"] {
            argument.set_value(Some(accepted.into())).expect("in range");
            assert_eq!(argument.value.as_deref(), Some(accepted));
        }
        for rejected in ["3", "-1"] {
            let err = argument.set_value(Some(rejected.into())).unwrap_err();
            assert!(matches!(err, ValidationError::OutOfRange { .. }));
            assert_eq!(argument.value.as_deref(), Some("2"));
            assert_eq!(argument.rejection, Some(err));
        }
    }

    #[test]
    fn float_range_and_bool_tokens() {
        let volume = Argument::new("V", "float[0.0..1.0]");
        assert!(volume.check(Some("0.5")).is_ok());
        assert!(volume.check(Some("1.0")).is_ok());
        assert!(matches!(
            volume.check(Some("1.5")),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            volume.check(Some("loud")),
            Err(ValidationError::NotAFloat { .. })
        ));

        let flag = Argument::new("R", "bool");
        assert!(flag.check(Some("True")).is_ok());
        assert!(flag.check(Some("False")).is_ok());
        assert!(matches!(
            flag.check(Some("yes")),
            Err(ValidationError::NotABool { .. })
        ));
    }

    #[test]
    fn selection_rejects_unknown_choice() {
        let mut platform = Argument::new("extern_platform", "selection[lidarts,nakka,dartboards]");
        assert!(platform.set_value(Some("nakka".into())).is_ok());
        let err = platform.set_value(Some("darts1".into())).unwrap_err();
        assert!(matches!(err, ValidationError::NotAChoice { .. }));
        assert_eq!(platform.value.as_deref(), Some("nakka"));
    }

    #[test]
    fn validate_type_records_and_clears_rejection() {
        let mut argument = Argument::new("DLL", "int").with_value("many");
        assert!(argument.validate_type().is_err());
        assert!(argument.rejection.is_some());
        argument.value = Some("10".into());
        assert!(argument.validate_type().is_ok());
        assert!(argument.rejection.is_none());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(matches!(
            "colour".parse::<ArgumentType>(),
            Err(ValidationError::UnknownType(_))
        ));
        assert!("int[0..x]".parse::<ArgumentType>().is_err());
    }

    #[test]
    fn type_strings_round_trip_through_display() {
        for raw in [
            "string",
            "int",
            "int[0..6]",
            "float[0.0..1.0]",
            "float[0.0..10.0]",
            "selection[lidarts,nakka,dartboards]",
        ] {
            let parsed: ArgumentType = raw.parse().unwrap();
            assert_eq!(parsed.to_string(), raw);
        }
    }

    #[test]
    fn multi_values_split_and_join_symmetrically() {
        let mut endpoints = Argument::new("WEPS", "string").multi();
        endpoints
            .set_values(["192.168.0.20", "192.168.0.21"])
            .unwrap();
        assert_eq!(endpoints.value.as_deref(), Some("192.168.0.20;192.168.0.21"));
        let values = endpoints.values();
        assert_eq!(values, vec!["192.168.0.20", "192.168.0.21"]);
        assert_eq!(join_multi(&values), endpoints.value.clone().unwrap());
    }

    #[test]
    fn mapping_is_applied_to_encoded_values() {
        let argument = Argument::new("R", "bool").bool_mapping().with_value("True");
        assert_eq!(argument.encoded_values(), vec!["1"]);
        let unmapped = Argument::new("C", "string").with_value("Anna");
        assert_eq!(unmapped.encoded_values(), vec!["Anna"]);
    }

    #[test]
    fn serialised_form_omits_defaults() {
        let argument = Argument::new("U", "string").required().human("-U / --autodarts_email");
        let json = serde_json::to_value(&argument).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Name": "U",
                "Type": "string",
                "Required": true,
                "NameHuman": "-U / --autodarts_email"
            })
        );
    }
}
