//! Configuration trees and their Cartesian-product expansion.
//!
//! A [`ConfigTree`] is an ordered list of named nodes. Each node is a
//! [`Parameter`], a nested tree, or a variant axis: a list of alternative
//! sub-trees, each of which is one value of an outer sweep.
//!
//! # Expansion order
//!
//! [`ConfigTree::enumerate`] visits the tree depth-first, children in
//! insertion order, and treats every node as one digit of a mixed-radix
//! counter. The **last visited axis varies fastest**:
//!
//! ```ignore
//! let mut tree = ConfigTree::new("test");
//! tree.insert("a", vec![1, 2], ParameterOptions::default())?;
//! tree.insert("b", vec![10, 20], ParameterOptions::default())?;
//! // (a=1,b=10), (a=1,b=20), (a=2,b=10), (a=2,b=20)
//! ```
//!
//! A variant axis is a single digit whose size is the sum of the expansion
//! sizes of its variants. Shaped results split the sweep per variant first
//! (see [`ConfigTree::variants`]), so each variant yields a dense row-major
//! array over its own sequenced parameters.

use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};
use crate::parameter::{HashCache, Parameter, ParameterOptions};
use crate::value::Value;

/// Mapping key that turns a list of mappings into a variant axis on insertion
pub const VARIANTS_KEY: &str = "variants";

/// A node of a configuration tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigNode {
    Leaf(Parameter),
    Branch(ConfigTree),
    /// One sweep axis whose values are whole sub-configurations
    Variants(Vec<ConfigTree>),
}

impl ConfigNode {
    /// Number of leaf configurations this node contributes as one digit
    fn expansion_len(&self) -> usize {
        match self {
            ConfigNode::Leaf(p) => p.len(),
            ConfigNode::Branch(t) => t.len(),
            ConfigNode::Variants(variants) => variants.iter().map(ConfigTree::len).sum(),
        }
    }

    fn stable_hash(&self) -> u64 {
        match self {
            ConfigNode::Leaf(p) => p.stable_hash(),
            ConfigNode::Branch(t) => t.stable_hash(),
            ConfigNode::Variants(variants) => {
                let mut hasher = FxHasher::default();
                for v in variants {
                    v.stable_hash().hash(&mut hasher);
                }
                hasher.finish()
            }
        }
    }
}

/// Named tree of sweep parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigTree {
    name: String,
    entries: Vec<(String, ConfigNode)>,
    #[serde(skip)]
    hash: HashCache,
}

/// One sequenced parameter of a variant-free tree, in expansion order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepAxis {
    /// Dotted path from the tree root
    pub path: String,
    pub values: Vec<Value>,
    /// Whether the owning parameter keeps its values sorted
    pub sorted: bool,
}

fn split_path(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(SweepError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

impl ConfigTree {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            hash: HashCache::default(),
        }
    }

    /// Build a tree from a mapping value, see [`ConfigTree::insert`].
    pub fn from_value(
        name: impl Into<String>,
        value: Value,
        options: ParameterOptions,
    ) -> Result<Self> {
        let name = name.into();
        let Value::Map(entries) = value else {
            return Err(SweepError::invalid_value(
                &name,
                "a configuration tree must be built from a mapping",
            ));
        };
        let mut tree = ConfigTree::new(name);
        for (key, value) in entries {
            let node = node_from_value(&key, value, options)?;
            tree.put(key, node)?;
        }
        Ok(tree)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.hash.invalidate();
    }

    /// Child nodes in insertion order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ConfigNode)> {
        self.entries.iter().map(|(k, n)| (k.as_str(), n))
    }

    /// Attach a value at a dotted path, creating intermediate branches.
    ///
    /// Mappings become branches; a mapping holding only a `variants` list of
    /// mappings (each with a `name` entry) becomes a variant axis; anything
    /// else becomes a [`Parameter`]. An existing node with the same key is
    /// replaced in place.
    pub fn insert(
        &mut self,
        path: &str,
        value: impl Into<Value>,
        options: ParameterOptions,
    ) -> Result<()> {
        let segments = split_path(path)?;
        let (key, parents) = segments
            .split_last()
            .ok_or_else(|| SweepError::InvalidPath(path.to_string()))?;
        let node = node_from_value(key, value.into(), options)?;
        self.branch_mut(parents, path, true)?.put((*key).to_string(), node)
    }

    /// Attach a sub-tree at a dotted path.
    pub fn insert_tree(&mut self, path: &str, tree: ConfigTree) -> Result<()> {
        let segments = split_path(path)?;
        let (key, parents) = segments
            .split_last()
            .ok_or_else(|| SweepError::InvalidPath(path.to_string()))?;
        self.branch_mut(parents, path, true)?
            .put((*key).to_string(), ConfigNode::Branch(tree))
    }

    /// Attach a variant axis at a dotted path. Variant names must be unique.
    pub fn insert_variants(&mut self, path: &str, variants: Vec<ConfigTree>) -> Result<()> {
        let segments = split_path(path)?;
        let (key, parents) = segments
            .split_last()
            .ok_or_else(|| SweepError::InvalidPath(path.to_string()))?;
        check_variant_names(key, &variants)?;
        self.branch_mut(parents, path, true)?
            .put((*key).to_string(), ConfigNode::Variants(variants))
    }

    /// Node at a dotted path. A segment following a variant axis selects a
    /// variant by name.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&ConfigNode> {
        let segments = split_path(path).ok()?;
        let mut tree = self;
        let mut i = 0;
        loop {
            let node = tree.child(segments[i])?;
            i += 1;
            if i == segments.len() {
                return Some(node);
            }
            tree = match node {
                ConfigNode::Branch(t) => t,
                ConfigNode::Variants(variants) => {
                    let variant = variants.iter().find(|v| v.name == segments[i])?;
                    i += 1;
                    if i == segments.len() {
                        return None;
                    }
                    variant
                }
                ConfigNode::Leaf(_) => return None,
            };
        }
    }

    #[must_use]
    pub fn parameter(&self, path: &str) -> Option<&Parameter> {
        match self.get(path)? {
            ConfigNode::Leaf(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub fn value(&self, path: &str) -> Option<&Value> {
        self.parameter(path).map(Parameter::value)
    }

    /// Replace the value of an existing parameter, keeping its policy.
    pub fn set_value(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        self.leaf_mut(path)?.set_value(value)
    }

    pub fn add_value(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        self.leaf_mut(path)?.add_value(value)
    }

    pub fn add_values<V: Into<Value>>(
        &mut self,
        path: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Result<()> {
        self.leaf_mut(path)?.add_values(values)
    }

    /// Number of leaf configurations produced by [`ConfigTree::enumerate`]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, node)| node.expansion_len())
            .product()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn has_variants(&self) -> bool {
        self.entries.iter().any(|(_, node)| match node {
            ConfigNode::Variants(_) => true,
            ConfigNode::Branch(t) => t.has_variants(),
            ConfigNode::Leaf(_) => false,
        })
    }

    /// Lazily expand into every leaf configuration; last visited axis fastest.
    pub fn enumerate(&self) -> Expansion<'_> {
        Expansion {
            tree: self,
            next: 0,
            len: self.len(),
        }
    }

    /// The leaf configuration at position `index` of the expansion.
    #[must_use]
    pub fn leaf_at(&self, index: usize) -> Option<LeafConfiguration> {
        if index >= self.len() {
            return None;
        }
        let mut variants = Vec::new();
        let tree = self.pin(index, &mut variants);
        Some(LeafConfiguration {
            index,
            variants,
            tree,
        })
    }

    /// Dimension lengths of every sequenced parameter in traversal order.
    ///
    /// `None` when the tree holds a variant axis; split it with
    /// [`ConfigTree::variants`] first.
    #[must_use]
    pub fn shape(&self) -> Option<Vec<usize>> {
        if self.has_variants() {
            return None;
        }
        Some(self.axes().iter().map(|a| a.values.len()).collect())
    }

    /// Every sequenced parameter in traversal order, variant axes excluded.
    #[must_use]
    pub fn axes(&self) -> Vec<SweepAxis> {
        let mut axes = Vec::new();
        self.collect_axes("", &mut axes);
        axes
    }

    fn collect_axes(&self, prefix: &str, axes: &mut Vec<SweepAxis>) {
        for (key, node) in &self.entries {
            match node {
                ConfigNode::Leaf(p) if p.is_sequenced() => axes.push(SweepAxis {
                    path: join_path(prefix, key),
                    values: p.values().cloned().collect(),
                    sorted: p.options().sort_sequence,
                }),
                ConfigNode::Branch(t) => t.collect_axes(&join_path(prefix, key), axes),
                _ => {}
            }
        }
    }

    /// Split into one variant-free tree per combination of variants.
    ///
    /// Labels are the tree name followed by the chosen variant names, joined
    /// with dots (`test.ising`). A tree without variants yields itself under
    /// its own name. Combinations follow expansion order.
    #[must_use]
    pub fn variants(&self) -> Vec<(String, ConfigTree)> {
        self.split_variants()
            .into_iter()
            .map(|(names, tree)| {
                let label = std::iter::once(self.name.as_str())
                    .chain(names.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(".");
                (label, tree)
            })
            .collect()
    }

    fn split_variants(&self) -> Vec<(Vec<String>, ConfigTree)> {
        let mut combos: Vec<(Vec<String>, Vec<(String, ConfigNode)>)> = vec![(Vec::new(), Vec::new())];
        for (key, node) in &self.entries {
            let options: Vec<(Vec<String>, ConfigNode)> = match node {
                ConfigNode::Leaf(p) => vec![(Vec::new(), ConfigNode::Leaf(p.clone()))],
                ConfigNode::Branch(t) => t
                    .split_variants()
                    .into_iter()
                    .map(|(names, t)| (names, ConfigNode::Branch(t)))
                    .collect(),
                ConfigNode::Variants(variants) => variants
                    .iter()
                    .flat_map(|v| {
                        v.split_variants().into_iter().map(move |(names, t)| {
                            let mut all = vec![v.name.clone()];
                            all.extend(names);
                            (all, ConfigNode::Branch(t))
                        })
                    })
                    .collect(),
            };
            let mut next = Vec::with_capacity(combos.len() * options.len());
            for (names, entries) in &combos {
                for (option_names, option) in &options {
                    let mut names = names.clone();
                    names.extend(option_names.iter().cloned());
                    let mut entries = entries.clone();
                    entries.push((key.clone(), option.clone()));
                    next.push((names, entries));
                }
            }
            combos = next;
        }
        combos
            .into_iter()
            .map(|(names, entries)| {
                (
                    names,
                    ConfigTree {
                        name: self.name.clone(),
                        entries,
                        hash: HashCache::default(),
                    },
                )
            })
            .collect()
    }

    /// True if both trees have the same shape and every parameter holds the
    /// same values under the same policy, ignoring value order.
    #[must_use]
    pub fn is_equivalent(&self, other: &ConfigTree) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().all(|(key, node)| {
                let Some(theirs) = other.child(key) else {
                    return false;
                };
                match (node, theirs) {
                    (ConfigNode::Leaf(a), ConfigNode::Leaf(b)) => {
                        let mut xs: Vec<&Value> = a.values().collect();
                        let mut ys: Vec<&Value> = b.values().collect();
                        xs.sort();
                        ys.sort();
                        a.name() == b.name()
                            && a.options() == b.options()
                            && a.is_sequenced() == b.is_sequenced()
                            && xs == ys
                    }
                    (ConfigNode::Branch(a), ConfigNode::Branch(b)) => a.is_equivalent(b),
                    (ConfigNode::Variants(a), ConfigNode::Variants(b)) => {
                        a.len() == b.len()
                            && a.iter().all(|va| {
                                b.iter()
                                    .find(|vb| vb.name == va.name)
                                    .is_some_and(|vb| va.is_equivalent(vb))
                            })
                    }
                    _ => false,
                }
            })
    }

    /// Union every parameter of `other` into this tree.
    ///
    /// Both trees must have the same shape; nothing is modified otherwise.
    pub fn merge_with(&mut self, other: &ConfigTree) -> Result<()> {
        self.check_shape(other, "")?;
        self.merge_unchecked(other);
        Ok(())
    }

    fn check_shape(&self, other: &ConfigTree, prefix: &str) -> Result<()> {
        let mismatch = |path: String, reason: &str| {
            Err(SweepError::IncompatibleShape(format!(
                "`{}` {reason}",
                if path.is_empty() { self.name.clone() } else { path }
            )))
        };
        if self.entries.len() != other.entries.len() {
            return mismatch(prefix.to_string(), "has a different number of children");
        }
        for (key, node) in &self.entries {
            let path = join_path(prefix, key);
            let Some(theirs) = other.child(key) else {
                return mismatch(path, "is missing from the other tree");
            };
            match (node, theirs) {
                (ConfigNode::Leaf(_), ConfigNode::Leaf(_)) => {}
                (ConfigNode::Branch(a), ConfigNode::Branch(b)) => a.check_shape(b, &path)?,
                (ConfigNode::Variants(a), ConfigNode::Variants(b)) => {
                    if a.len() != b.len() {
                        return mismatch(path, "has a different number of variants");
                    }
                    for va in a {
                        let Some(vb) = b.iter().find(|vb| vb.name == va.name) else {
                            return mismatch(path, "has different variants");
                        };
                        va.check_shape(vb, &join_path(&path, &va.name))?;
                    }
                }
                _ => return mismatch(path, "has a different node kind"),
            }
        }
        Ok(())
    }

    fn merge_unchecked(&mut self, other: &ConfigTree) {
        self.hash.invalidate();
        for (key, node) in &mut self.entries {
            let Some(theirs) = other.child(key) else {
                continue;
            };
            match (node, theirs) {
                (ConfigNode::Leaf(a), ConfigNode::Leaf(b)) => a.union_with(b),
                (ConfigNode::Branch(a), ConfigNode::Branch(b)) => a.merge_unchecked(b),
                (ConfigNode::Variants(a), ConfigNode::Variants(b)) => {
                    for va in a.iter_mut() {
                        if let Some(vb) = b.iter().find(|vb| vb.name == va.name) {
                            va.merge_unchecked(vb);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Hash aggregated over the tree name, keys and every parameter value,
    /// cached until the next mutation made through this tree.
    pub fn stable_hash(&self) -> u64 {
        self.hash.get_or_compute(|| {
            let mut hasher = FxHasher::default();
            self.name.hash(&mut hasher);
            for (key, node) in &self.entries {
                key.hash(&mut hasher);
                node.stable_hash().hash(&mut hasher);
            }
            hasher.finish()
        })
    }

    pub(crate) fn hash_is_cached(&self) -> bool {
        self.hash.is_cached()
    }

    fn child(&self, key: &str) -> Option<&ConfigNode> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, n)| n)
    }

    fn put(&mut self, key: String, node: ConfigNode) -> Result<()> {
        self.hash.invalidate();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = node,
            None => self.entries.push((key, node)),
        }
        Ok(())
    }

    /// Walk to the branch at `segments`, invalidating every cache on the way.
    fn branch_mut(&mut self, segments: &[&str], path: &str, create: bool) -> Result<&mut ConfigTree> {
        self.hash.invalidate();
        let Some((key, rest)) = segments.split_first() else {
            return Ok(self);
        };
        let position = match self.entries.iter().position(|(k, _)| k == key) {
            Some(position) => position,
            None if create => {
                self.entries
                    .push(((*key).to_string(), ConfigNode::Branch(ConfigTree::new(*key))));
                self.entries.len() - 1
            }
            None => return Err(SweepError::InvalidPath(path.to_string())),
        };
        match &mut self.entries[position].1 {
            ConfigNode::Branch(t) => t.branch_mut(rest, path, create),
            ConfigNode::Variants(variants) => {
                let Some((variant_name, rest)) = rest.split_first() else {
                    return Err(SweepError::InvalidPath(path.to_string()));
                };
                let variant = variants
                    .iter_mut()
                    .find(|v| v.name == *variant_name)
                    .ok_or_else(|| SweepError::InvalidPath(path.to_string()))?;
                variant.branch_mut(rest, path, create)
            }
            ConfigNode::Leaf(_) => Err(SweepError::InvalidPath(path.to_string())),
        }
    }

    fn leaf_mut(&mut self, path: &str) -> Result<&mut Parameter> {
        let segments = split_path(path)?;
        let (key, parents) = segments
            .split_last()
            .ok_or_else(|| SweepError::InvalidPath(path.to_string()))?;
        let parent = self.branch_mut(parents, path, false)?;
        parent.hash.invalidate();
        match parent.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, ConfigNode::Leaf(p))) => Ok(p),
            _ => Err(SweepError::InvalidPath(path.to_string())),
        }
    }

    /// Pin every node to one value, decoding `index` in mixed radix.
    fn pin(&self, index: usize, variants: &mut Vec<String>) -> ConfigTree {
        let lens: Vec<usize> = self
            .entries
            .iter()
            .map(|(_, node)| node.expansion_len())
            .collect();
        let mut digits = vec![0; lens.len()];
        let mut remaining = index;
        for i in (0..lens.len()).rev() {
            digits[i] = remaining % lens[i];
            remaining /= lens[i];
        }

        let mut entries = Vec::with_capacity(self.entries.len());
        for ((key, node), digit) in self.entries.iter().zip(digits) {
            let pinned = match node {
                ConfigNode::Leaf(p) => {
                    let value = p.values().nth(digit).cloned().unwrap_or_else(|| p.value().clone());
                    ConfigNode::Leaf(p.pinned(value))
                }
                ConfigNode::Branch(t) => ConfigNode::Branch(t.pin(digit, variants)),
                ConfigNode::Variants(options) => {
                    let mut offset = digit;
                    let mut chosen = None;
                    for v in options {
                        let n = v.len();
                        if offset < n {
                            variants.push(v.name.clone());
                            chosen = Some(v.pin(offset, variants));
                            break;
                        }
                        offset -= n;
                    }
                    // digit < sum of variant lengths, so a variant is always chosen
                    ConfigNode::Branch(chosen.unwrap_or_else(|| ConfigTree::new(key.clone())))
                }
            };
            entries.push((key.clone(), pinned));
        }
        ConfigTree {
            name: self.name.clone(),
            entries,
            hash: HashCache::default(),
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        for (key, node) in &self.entries {
            match node {
                ConfigNode::Leaf(p) => writeln!(f, "{pad}{key}: {}", p.format())?,
                ConfigNode::Branch(t) => {
                    if t.name == *key {
                        writeln!(f, "{pad}{key}")?;
                    } else {
                        writeln!(f, "{pad}{key} ({})", t.name)?;
                    }
                    t.fmt_indented(f, depth + 1)?;
                }
                ConfigNode::Variants(variants) => {
                    writeln!(f, "{pad}{key} (variants)")?;
                    for v in variants {
                        writeln!(f, "{pad}  {}", v.name)?;
                        v.fmt_indented(f, depth + 2)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_variant_names(key: &str, variants: &[ConfigTree]) -> Result<()> {
    for (i, v) in variants.iter().enumerate() {
        if variants[..i].iter().any(|other| other.name == v.name) {
            return Err(SweepError::invalid_value(
                key,
                format!("duplicate variant `{}`", v.name),
            ));
        }
    }
    Ok(())
}

fn node_from_value(key: &str, value: Value, options: ParameterOptions) -> Result<ConfigNode> {
    match value {
        Value::Map(mut entries) => {
            if entries.len() == 1 && entries[0].0 == VARIANTS_KEY {
                if let Some((_, Value::List(items))) = entries.pop() {
                    let variants = items
                        .into_iter()
                        .map(|item| variant_from_value(key, item, options))
                        .collect::<Result<Vec<_>>>()?;
                    check_variant_names(key, &variants)?;
                    return Ok(ConfigNode::Variants(variants));
                }
                return Err(SweepError::invalid_value(
                    key,
                    "`variants` must hold a list of mappings",
                ));
            }
            Ok(ConfigNode::Branch(ConfigTree::from_value(
                key,
                Value::Map(entries),
                options,
            )?))
        }
        other => Ok(ConfigNode::Leaf(Parameter::with_options(key, other, options)?)),
    }
}

fn variant_from_value(key: &str, value: Value, options: ParameterOptions) -> Result<ConfigTree> {
    let Value::Map(mut entries) = value else {
        return Err(SweepError::invalid_value(key, "each variant must be a mapping"));
    };
    let position = entries
        .iter()
        .position(|(k, v)| k == "name" && matches!(v, Value::Text(_)))
        .ok_or_else(|| SweepError::invalid_value(key, "each variant needs a `name` entry"))?;
    let (_, name) = entries.remove(position);
    let name = name.as_str().unwrap_or_default().to_string();
    ConfigTree::from_value(name, Value::Map(entries), options)
}

impl PartialEq for ConfigTree {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.entries == other.entries
    }
}

impl fmt::Display for ConfigTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        self.fmt_indented(f, 1)
    }
}

/// Lazy, restartable expansion of a configuration tree
#[derive(Debug, Clone)]
pub struct Expansion<'a> {
    tree: &'a ConfigTree,
    next: usize,
    len: usize,
}

impl Iterator for Expansion<'_> {
    type Item = LeafConfiguration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.len {
            return None;
        }
        let leaf = self.tree.leaf_at(self.next);
        self.next += 1;
        leaf
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Expansion<'_> {}

/// One fully concrete point of a sweep.
///
/// Isomorphic to its source tree, with every parameter pinned to a single
/// value and every variant axis replaced by the chosen variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafConfiguration {
    index: usize,
    variants: Vec<String>,
    tree: ConfigTree,
}

impl LeafConfiguration {
    /// Position in the expansion that produced this configuration
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.tree.name
    }

    /// Names of the chosen variants, in traversal order
    #[must_use]
    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Tree name followed by the chosen variants (`test.ising`)
    #[must_use]
    pub fn label(&self) -> String {
        std::iter::once(self.tree.name.as_str())
            .chain(self.variants.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(".")
    }

    #[must_use]
    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.tree.value(path)
    }

    #[must_use]
    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(Value::as_f64)
    }

    #[must_use]
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(Value::as_i64)
    }

    #[must_use]
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Every pinned parameter as `(dotted path, value)`, in traversal order
    #[must_use]
    pub fn assignments(&self) -> Vec<(String, &Value)> {
        fn walk<'a>(tree: &'a ConfigTree, prefix: &str, out: &mut Vec<(String, &'a Value)>) {
            for (key, node) in &tree.entries {
                match node {
                    ConfigNode::Leaf(p) => out.push((join_path(prefix, key), p.value())),
                    ConfigNode::Branch(t) => walk(t, &join_path(prefix, key), out),
                    ConfigNode::Variants(_) => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.tree, "", &mut out);
        out
    }
}

impl fmt::Display for LeafConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.label())?;
        for (i, (path, value)) in self.assignments().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{path}={value}")?;
        }
        write!(f, ")")
    }
}
