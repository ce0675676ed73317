//! Skills: named prompt templates invoked against a generation backend.
//!
//! A template references arguments as `{{$name}}` (whitespace inside the
//! braces is allowed). Missing arguments render as empty text.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// String-keyed arguments passed along with a skill invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillArguments(BTreeMap<String, String>);

impl SkillArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for arguments holding only `input`.
    pub fn with_input(input: impl Into<String>) -> Self {
        let mut args = Self::new();
        args.insert("input", input);
        args
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Sampling settings attached to a skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillSettings {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.8
}
fn default_top_p() -> f32 {
    1.0
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for SkillSettings {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// A named prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub template: String,
    /// Overrides the backend's default sampling settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SkillSettings>,
}

impl Skill {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            settings: None,
        }
    }

    pub fn with_settings(mut self, settings: SkillSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn render(&self, args: &SkillArguments) -> String {
        render_template(&self.template, args)
    }
}

/// Substitute `{{$name}}` placeholders from `args`.
pub fn render_template(template: &str, args: &SkillArguments) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let inner = after[..end].trim();
        match inner.strip_prefix('$') {
            Some(name) if !name.is_empty() => out.push_str(args.get(name.trim()).unwrap_or("")),
            // Not a variable reference; keep it verbatim.
            _ => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

/// Skills available to a backend, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct SkillLibrary {
    skills: HashMap<String, Skill>,
}

impl SkillLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill, replacing any previous one with the same name.
    pub fn register(&mut self, skill: Skill) {
        self.skills.insert(skill.name.clone(), skill);
    }

    pub fn get(&self, name: &str) -> Option<&Skill> {
        self.skills.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.skills.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}
