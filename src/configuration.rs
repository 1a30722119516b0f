use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::argument::Argument;
use crate::error::{AssemblyError, ValidationError};

fn default_delimiter() -> String {
    " ".into()
}

fn default_list_separator() -> String {
    " ".into()
}

fn is_default_list_separator(value: &String) -> bool {
    value == " "
}

/// Ordered, typed command-line definition of an app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Configuration {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    #[serde(rename = "Delimitter", alias = "Delimiter", default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Argument>,
    /// Joins the values of multi-value arguments on the command line.
    #[serde(
        default = "default_list_separator",
        skip_serializing_if = "is_default_list_separator"
    )]
    pub list_separator: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new("", " ", Vec::new())
    }
}

impl Configuration {
    pub fn new(prefix: &str, delimiter: &str, arguments: Vec<Argument>) -> Self {
        Self {
            prefix: prefix.to_string(),
            delimiter: delimiter.to_string(),
            arguments,
            list_separator: default_list_separator(),
        }
    }

    pub fn find(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|argument| argument.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Argument> {
        self.arguments
            .iter_mut()
            .find(|argument| argument.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Appends `argument` unless one with the same name exists.
    pub fn add_if_absent(&mut self, argument: Argument) -> bool {
        if self.contains(&argument.name) {
            return false;
        }
        self.arguments.push(argument);
        true
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.arguments.len();
        self.arguments.retain(|argument| argument.name != name);
        before != self.arguments.len()
    }

    /// Keeps the first argument of every name.
    pub fn dedupe(&mut self) -> bool {
        let mut seen = IndexSet::new();
        let before = self.arguments.len();
        self.arguments
            .retain(|argument| seen.insert(argument.name.clone()));
        before != self.arguments.len()
    }

    /// Re-validates every argument, returning the ones that were rejected.
    pub fn validate_all(&mut self) -> Vec<(String, ValidationError)> {
        self.arguments
            .iter_mut()
            .filter_map(|argument| {
                argument
                    .validate_type()
                    .err()
                    .map(|err| (argument.name.clone(), err))
            })
            .collect()
    }

    /// Copy of this configuration with per-run overrides applied.
    ///
    /// Overrides for unknown names are appended as plain string arguments.
    pub fn with_overrides(&self, runtime: &IndexMap<String, String>) -> Configuration {
        let mut effective = self.clone();
        for (name, value) in runtime {
            match effective.find_mut(name) {
                Some(argument) => argument.value = Some(value.clone()),
                None => effective
                    .arguments
                    .push(Argument::new(name.clone(), "string").with_value(value.clone())),
            }
        }
        effective
    }

    fn condition_holds(&self, argument: &Argument) -> bool {
        match argument.condition() {
            None => true,
            Some((other, expected)) => self
                .find(other)
                .and_then(|other| other.value.as_deref())
                .is_some_and(|value| value == expected),
        }
    }

    /// First required argument that still lacks a value, if any.
    pub fn missing_required(&self, runtime: &IndexMap<String, String>) -> Option<&str> {
        let effective = self.with_overrides(runtime);
        let missing = effective
            .arguments
            .iter()
            .find(|argument| {
                (argument.required || argument.condition().is_some())
                    && !argument.is_set()
                    && effective.condition_holds(argument)
            })
            .map(|argument| argument.name.clone())?;
        self.find(&missing).map(|argument| argument.display_name())
    }

    /// Assembles the argv tokens for a single run.
    ///
    /// `skip` names arguments consumed by the caller instead of emitted as flags.
    pub fn assemble(
        &self,
        runtime: &IndexMap<String, String>,
        skip: &[&str],
    ) -> Result<Vec<String>, AssemblyError> {
        let effective = self.with_overrides(runtime);
        let mut tokens = Vec::new();
        for argument in &effective.arguments {
            if skip.contains(&argument.name.as_str()) {
                continue;
            }
            let required = argument.required || argument.condition().is_some();
            if !effective.condition_holds(argument) {
                continue;
            }
            if !argument.is_set() {
                if required {
                    return Err(AssemblyError::MissingRequired {
                        argument: argument.name.clone(),
                    });
                }
                continue;
            }
            argument
                .check(argument.value.as_deref())
                .map_err(|source| AssemblyError::Invalid {
                    argument: argument.name.clone(),
                    source,
                })?;
            effective.emit(argument, &mut tokens);
        }
        Ok(tokens)
    }

    fn emit(&self, argument: &Argument, tokens: &mut Vec<String>) {
        let flag = format!("{}{}", self.prefix, argument.name);
        let values = argument.encoded_values();
        let separate_values = argument.is_multi && self.list_separator.trim().is_empty();
        if self.delimiter.trim().is_empty() {
            tokens.push(flag);
            if separate_values {
                tokens.extend(values);
            } else {
                tokens.push(values.join(&self.list_separator));
            }
        } else {
            tokens.push(format!(
                "{flag}{}{}",
                self.delimiter,
                values.join(&self.list_separator)
            ));
        }
    }

    /// Human-readable command line, quoting tokens that contain whitespace.
    pub fn command_line(
        &self,
        runtime: &IndexMap<String, String>,
        skip: &[&str],
    ) -> Result<String, AssemblyError> {
        let tokens = self.assemble(runtime, skip)?;
        Ok(render_tokens(&tokens))
    }
}

pub fn render_tokens(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|token| {
            if token.is_empty() || token.chars().any(char::is_whitespace) {
                format!("\"{}\"", token.replace('"', "\\\""))
            } else {
                token.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
