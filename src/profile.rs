use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::argument::is_false;
use crate::error::ProfileError;

/// Membership of one app in a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProfileState {
    #[serde(default, skip_serializing_if = "is_false")]
    pub tagged_for_start: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_required: bool,
    /// Per-profile overrides applied to the app's arguments at launch.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub runtime_arguments: IndexMap<String, String>,
    #[serde(skip)]
    app: Option<String>,
}

impl ProfileState {
    pub fn optional() -> Self {
        Self::default()
    }

    /// Required apps are always tagged.
    pub fn required() -> Self {
        Self {
            tagged_for_start: true,
            is_required: true,
            ..Self::default()
        }
    }

    pub fn with_runtime_argument(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.runtime_arguments.insert(name.into(), value.into());
        self
    }

    pub fn is_tagged(&self) -> bool {
        self.tagged_for_start || self.is_required
    }

    pub(crate) fn link(&mut self, app: &str) {
        self.app = Some(app.to_string());
    }

    /// Name of the catalog app this state was resolved against.
    pub fn linked_app(&self) -> Option<&str> {
        self.app.as_deref()
    }
}

/// Named selection of apps started together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub apps: IndexMap<String, ProfileState>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            apps: IndexMap::new(),
        }
    }

    pub fn with_app(mut self, app: impl Into<String>, state: ProfileState) -> Self {
        self.apps.insert(app.into(), state);
        self
    }

    pub fn contains(&self, app: &str) -> bool {
        self.apps.contains_key(app)
    }

    pub fn insert_if_absent(&mut self, app: &str, state: ProfileState) -> bool {
        if self.apps.contains_key(app) {
            return false;
        }
        self.apps.insert(app.to_string(), state);
        true
    }

    pub fn remove(&mut self, app: &str) -> bool {
        self.apps.shift_remove(app).is_some()
    }

    pub fn tag(&mut self, app: &str) -> Result<(), ProfileError> {
        self.set_tagged(app, true)
    }

    /// Required apps refuse to be untagged.
    pub fn untag(&mut self, app: &str) -> Result<(), ProfileError> {
        self.set_tagged(app, false)
    }

    pub fn set_tagged(&mut self, app: &str, tagged: bool) -> Result<(), ProfileError> {
        let state = self
            .apps
            .get_mut(app)
            .ok_or_else(|| ProfileError::UnknownApp {
                profile: self.name.clone(),
                app: app.to_string(),
            })?;
        if !tagged && state.is_required {
            return Err(ProfileError::Required {
                profile: self.name.clone(),
                app: app.to_string(),
            });
        }
        state.tagged_for_start = tagged;
        Ok(())
    }

    pub fn tagged_apps(&self) -> impl Iterator<Item = (&str, &ProfileState)> {
        self.apps
            .iter()
            .filter(|(_, state)| state.is_tagged())
            .map(|(name, state)| (name.as_str(), state))
    }
}
