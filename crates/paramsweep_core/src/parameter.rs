//! A single named sweep axis.
//!
//! A [`Parameter`] holds either one scalar or a sequence of values. Sequences
//! are normalized on every mutation according to [`ParameterOptions`]:
//! duplicates are removed unless repetition is allowed, and the result is
//! sorted ascending when `sort_sequence` is set.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};
use crate::value::{TypeTag, Value};

/// Lazily computed stable hash, invalidated explicitly by every mutator.
#[derive(Debug, Clone, Default)]
pub(crate) struct HashCache(OnceLock<u64>);

impl HashCache {
    pub(crate) fn get_or_compute(&self, compute: impl FnOnce() -> u64) -> u64 {
        *self.0.get_or_init(compute)
    }

    pub(crate) fn invalidate(&mut self) {
        self.0.take();
    }

    pub(crate) fn is_cached(&self) -> bool {
        self.0.get().is_some()
    }
}

/// Deduplication and ordering policy of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterOptions {
    /// Run-identity metadata: never unioned when configuration trees merge
    pub unique: bool,
    /// Keep repeated values instead of applying set semantics
    pub allow_repetition: bool,
    /// Never treat the value as a sweep axis, even if it is a list
    pub force_scalar: bool,
    /// Sort sequences ascending after deduplication
    pub sort_sequence: bool,
}

impl Default for ParameterOptions {
    fn default() -> Self {
        Self {
            unique: false,
            allow_repetition: false,
            force_scalar: false,
            sort_sequence: true,
        }
    }
}

impl ParameterOptions {
    #[must_use]
    pub fn scalar() -> Self {
        Self {
            force_scalar: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn unique() -> Self {
        Self {
            unique: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_repetition(mut self) -> Self {
        self.allow_repetition = true;
        self
    }

    #[must_use]
    pub fn unsorted(mut self) -> Self {
        self.sort_sequence = false;
        self
    }
}

/// A named scalar or sequence-valued sweep axis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    value: Value,
    #[serde(default)]
    options: ParameterOptions,
    #[serde(skip)]
    hash: HashCache,
}

impl Parameter {
    /// Create a parameter with the default policy (deduplicated, sorted).
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        Self::with_options(name, value, ParameterOptions::default())
    }

    pub fn with_options(
        name: impl Into<String>,
        value: impl Into<Value>,
        options: ParameterOptions,
    ) -> Result<Self> {
        let mut parameter = Self {
            name: name.into(),
            value: Value::Bool(false),
            options,
            hash: HashCache::default(),
        };
        parameter.set_value(value)?;
        Ok(parameter)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn options(&self) -> ParameterOptions {
        self.options
    }

    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.options.unique
    }

    /// Replace the value, applying the sequence policy.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.check_value(&value)?;
        self.value = match value {
            Value::List(items) if !self.options.force_scalar => Value::List(self.normalize(items)),
            other => other,
        };
        self.hash.invalidate();
        Ok(())
    }

    /// Append one value. A scalar is promoted to a two-element sequence.
    ///
    /// Once promoted the parameter stays a sequence, even when deduplication
    /// leaves a single element.
    pub fn add_value(&mut self, value: impl Into<Value>) -> Result<()> {
        self.add_values([value])
    }

    /// Append several values at once, then re-apply the sequence policy.
    pub fn add_values<V: Into<Value>>(&mut self, values: impl IntoIterator<Item = V>) -> Result<()> {
        if self.options.force_scalar {
            return Err(SweepError::NotSequenced(self.name.clone()));
        }
        let added: Vec<Value> = values.into_iter().map(Into::into).collect();
        if added.is_empty() {
            return Ok(());
        }
        for value in &added {
            self.check_value(value)?;
        }
        let mut items = self.values().cloned().collect::<Vec<_>>();
        items.extend(added);
        self.value = Value::List(self.normalize(items));
        self.hash.invalidate();
        Ok(())
    }

    /// True if the value is a list and the parameter is not forced scalar.
    #[must_use]
    pub fn is_sequenced(&self) -> bool {
        matches!(self.value, Value::List(_)) && !self.options.force_scalar
    }

    /// Number of values this axis contributes to an expansion (1 for scalars).
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.value {
            Value::List(items) if !self.options.force_scalar => items.len(),
            _ => 1,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index` of a sequenced parameter
    pub fn get(&self, index: usize) -> Result<&Value> {
        match &self.value {
            Value::List(items) if !self.options.force_scalar => {
                items.get(index).ok_or_else(|| SweepError::IndexOutOfBounds {
                    name: self.name.clone(),
                    index,
                    len: items.len(),
                })
            }
            _ => Err(SweepError::NotSequenced(self.name.clone())),
        }
    }

    /// Values in stored order: the scalar itself, or each sequence element.
    pub fn values(&self) -> std::slice::Iter<'_, Value> {
        match &self.value {
            Value::List(items) if !self.options.force_scalar => items.iter(),
            scalar => std::slice::from_ref(scalar).iter(),
        }
    }

    /// Type of the stored value, inspecting the first element of sequences.
    pub fn datatype(&self) -> Result<TypeTag> {
        if self.options.force_scalar || self.value.is_textual() {
            return self
                .value
                .type_tag()
                .ok_or_else(|| SweepError::invalid_value(&self.name, "mapping values are not allowed"));
        }
        infer_type(&self.name, &self.value)
    }

    /// Hash of the current value, cached until the next mutation.
    pub fn stable_hash(&self) -> u64 {
        self.hash.get_or_compute(|| {
            let mut hasher = FxHasher::default();
            self.value.hash(&mut hasher);
            hasher.finish()
        })
    }

    /// Display string of the value; text and paths are quoted.
    #[must_use]
    pub fn format(&self) -> String {
        if self.value.is_textual() {
            format!("`{}`", self.value)
        } else {
            self.value.to_string()
        }
    }

    /// Copy of this parameter pinned to a single value of its sequence.
    pub(crate) fn pinned(&self, value: Value) -> Parameter {
        Parameter {
            name: self.name.clone(),
            value,
            options: ParameterOptions {
                force_scalar: true,
                ..self.options
            },
            hash: HashCache::default(),
        }
    }

    /// Union `other`'s values into this parameter. Unique and forced-scalar
    /// parameters keep their own value.
    pub(crate) fn union_with(&mut self, other: &Parameter) {
        if self.options.unique || self.options.force_scalar {
            return;
        }
        if !self.is_sequenced() && !other.is_sequenced() && self.value == other.value {
            return;
        }
        let ours: Vec<Value> = self.values().cloned().collect();
        let theirs: Vec<Value> = other.values().cloned().collect();
        let items = if self.options.allow_repetition {
            multiset_union(&ours, &theirs)
        } else {
            [ours, theirs].concat()
        };
        self.value = Value::List(self.normalize(items));
        self.hash.invalidate();
    }

    pub(crate) fn hash_is_cached(&self) -> bool {
        self.hash.is_cached()
    }

    fn check_value(&self, value: &Value) -> Result<()> {
        if value.contains_map() {
            return Err(SweepError::invalid_value(
                &self.name,
                "mapping values are not allowed",
            ));
        }
        Ok(())
    }

    fn normalize(&self, mut items: Vec<Value>) -> Vec<Value> {
        match (self.options.allow_repetition, self.options.sort_sequence) {
            (false, true) => {
                items.sort();
                items.dedup();
            }
            (false, false) => {
                let mut seen = FxHashSet::default();
                items.retain(|v| seen.insert(v.clone()));
            }
            (true, true) => items.sort(),
            (true, false) => {}
        }
        items
    }
}

/// Union of two sequences as multisets: each value appears as many times as
/// on the side holding it most often. Extra copies from `theirs` are
/// appended in their order.
pub(crate) fn multiset_union(ours: &[Value], theirs: &[Value]) -> Vec<Value> {
    let mut unmatched: FxHashMap<&Value, usize> = FxHashMap::default();
    for v in ours {
        *unmatched.entry(v).or_default() += 1;
    }
    let mut items = ours.to_vec();
    for v in theirs {
        match unmatched.get_mut(v) {
            Some(n) if *n > 0 => *n -= 1,
            _ => items.push(v.clone()),
        }
    }
    items
}

fn infer_type(name: &str, value: &Value) -> Result<TypeTag> {
    match value {
        Value::Map(_) => Err(SweepError::invalid_value(
            name,
            "mapping values are not allowed",
        )),
        Value::List(items) => match items.first() {
            Some(first) => infer_type(name, first),
            None => Err(SweepError::invalid_value(
                name,
                "cannot infer the element type of an empty sequence",
            )),
        },
        other => other
            .type_tag()
            .ok_or_else(|| SweepError::invalid_value(name, "uninferable element type")),
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value && self.options == other.options
    }
}

impl Eq for Parameter {}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.format())
    }
}
