//! Task parameter values and parameter spaces.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Declared type of a parameter.
///
/// Values are always carried as strings; the backend coerces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParameterType {
    Int,
    Float,
    String,
    Path,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParameterType::Int => "INT",
            ParameterType::Float => "FLOAT",
            ParameterType::String => "STRING",
            ParameterType::Path => "PATH",
        };
        write!(f, "{}", s)
    }
}

/// A typed, string-encoded parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterValue {
    #[serde(rename = "type")]
    pub kind: ParameterType,
    pub value: String,
}

impl ParameterValue {
    pub fn new(kind: ParameterType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Values supplied by the user for one task, keyed by parameter name.
pub type TaskParameterOverrides = BTreeMap<String, String>;

/// The parameter values for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TaskParameterSet(BTreeMap<String, ParameterValue>);

impl TaskParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value for `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: ParameterValue) {
        self.0.insert(name.into(), value);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The raw values in name order.
    pub fn values(&self) -> Vec<&str> {
        self.0.values().map(|v| v.value.as_str()).collect()
    }
}

impl FromIterator<(String, ParameterValue)> for TaskParameterSet {
    fn from_iter<T: IntoIterator<Item = (String, ParameterValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A parameter declared by a step's parameter space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskParameterDefinition {
    pub name: String,
    pub kind: ParameterType,
}

impl TaskParameterDefinition {
    pub fn new(name: impl Into<String>, kind: ParameterType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Source of a parameter space's combinations.
///
/// Combinations must come back in a stable order; index 0 is the default
/// combination used to fill in values the user did not supply.
pub trait ParameterEnumerator: Send + Sync {
    /// Number of combinations.
    fn len(&self) -> usize;

    /// The combination at `index`, if any.
    fn get(&self, index: usize) -> Option<TaskParameterSet>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ParameterEnumerator for Vec<TaskParameterSet> {
    fn len(&self) -> usize {
        <[TaskParameterSet]>::len(self)
    }

    fn get(&self, index: usize) -> Option<TaskParameterSet> {
        <[TaskParameterSet]>::get(self, index).cloned()
    }
}

/// The named parameters a step's tasks vary over.
#[derive(Clone)]
pub struct ParameterSpace {
    definitions: Vec<TaskParameterDefinition>,
    combinations: Arc<dyn ParameterEnumerator>,
}

impl ParameterSpace {
    /// Create a space backed by an arbitrary enumerator.
    pub fn new(
        definitions: Vec<TaskParameterDefinition>,
        combinations: impl ParameterEnumerator + 'static,
    ) -> Self {
        Self {
            definitions,
            combinations: Arc::new(combinations),
        }
    }

    /// Create a space from an already enumerated list of combinations.
    pub fn from_combinations(
        definitions: Vec<TaskParameterDefinition>,
        combinations: Vec<TaskParameterSet>,
    ) -> Self {
        Self::new(definitions, combinations)
    }

    pub fn definitions(&self) -> &[TaskParameterDefinition] {
        &self.definitions
    }

    pub fn definition(&self, name: &str) -> Option<&TaskParameterDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// Number of combinations.
    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<TaskParameterSet> {
        self.combinations.get(index)
    }

    /// The default combination.
    pub fn first(&self) -> Option<TaskParameterSet> {
        self.get(0)
    }

    /// Iterate all combinations in enumeration order.
    pub fn iter(&self) -> Combinations<'_> {
        Combinations {
            space: self,
            index: 0,
        }
    }
}

impl fmt::Debug for ParameterSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterSpace")
            .field("definitions", &self.definitions)
            .field("combinations", &self.combinations.len())
            .finish()
    }
}

impl<'a> IntoIterator for &'a ParameterSpace {
    type Item = TaskParameterSet;
    type IntoIter = Combinations<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`ParameterSpace`].
#[derive(Debug)]
pub struct Combinations<'a> {
    space: &'a ParameterSpace,
    index: usize,
}

impl Iterator for Combinations<'_> {
    type Item = TaskParameterSet;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.space.get(self.index)?;
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.space.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Combinations<'_> {}
