//! Name → field resolution.
//!
//! Every name known to a data source maps to one [`FieldEntry`]:
//! a raw column, a derived expression over other fields, or an alias of
//! another name. Derived entries are never evaluated here; the registry
//! only knows how to find them and what they depend on.

use std::collections::BTreeMap;

use ap_core::{Error, FieldInfo, Result};

use crate::expr::CompiledExpr;

/// How a field name is resolved.
#[derive(Debug, Clone)]
pub enum FieldEntry {
    /// Backed by a stored column of the same name.
    Raw,
    /// Computed on demand from other fields.
    Derived(CompiledExpr),
    /// Another name for the target field.
    Alias(String),
}

#[derive(Debug, Clone)]
struct Registered {
    entry: FieldEntry,
    info: FieldInfo,
}

/// Resolved view of a field: the canonical name behind any aliases plus its entry.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    /// Name after following aliases.
    pub name: &'a str,
    /// Raw or derived entry (never an alias).
    pub entry: &'a FieldEntry,
    /// Metadata of the canonical field.
    pub info: &'a FieldInfo,
}

/// Registry of raw, derived and aliased fields.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: BTreeMap<String, Registered>,
}

/// Alias chains longer than this are treated as cycles.
const MAX_ALIAS_DEPTH: usize = 32;

impl FieldRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw field. Aliases listed in `info` are registered too.
    pub fn add_raw(&mut self, info: FieldInfo) {
        self.insert(FieldEntry::Raw, info);
    }

    /// Register a derived field from an expression.
    ///
    /// Prerequisites are not checked; a derived field whose inputs are
    /// missing fails at evaluation time with `FieldNotFound`.
    pub fn add_derived(&mut self, info: FieldInfo, expression: &str) -> Result<()> {
        let expr = CompiledExpr::compile(expression)?;
        self.insert(FieldEntry::Derived(expr), info);
        Ok(())
    }

    /// Register a derived field only if every field it references already
    /// resolves and the name is still free. Returns whether the field was
    /// registered.
    pub fn add_derived_if_available(&mut self, info: FieldInfo, expression: &str) -> Result<bool> {
        let expr = CompiledExpr::compile(expression)?;
        if self.fields.contains_key(&info.name) {
            log::debug!("skipping derived field '{}': name already registered", info.name);
            return Ok(false);
        }
        if let Some(missing) = expr.required_fields.iter().find(|f| !self.contains(f)) {
            log::debug!("skipping derived field '{}': '{}' not available", info.name, missing);
            return Ok(false);
        }
        self.insert(FieldEntry::Derived(expr), info);
        Ok(true)
    }

    /// Make `alias` resolve to `target`. The target need not exist yet.
    pub fn alias(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        let alias = alias.into();
        let info = FieldInfo::new(alias.clone());
        self.fields.insert(alias, Registered { entry: FieldEntry::Alias(target.into()), info });
    }

    /// Alias `alias` to `target` only when the target resolves. Returns whether it was added.
    pub fn alias_if_available(&mut self, alias: &str, target: &str) -> bool {
        if !self.contains(target) || self.fields.contains_key(alias) {
            return false;
        }
        self.alias(alias, target);
        true
    }

    /// Replace the metadata of an existing name (aliases included).
    pub fn set_info(&mut self, info: FieldInfo) -> Result<()> {
        match self.fields.get_mut(&info.name) {
            Some(r) => {
                r.info = info;
                Ok(())
            }
            None => Err(Error::FieldNotFound(info.name)),
        }
    }

    /// Whether `name` resolves to a raw or derived field.
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// Follow aliases to the canonical raw or derived entry.
    pub fn resolve(&self, name: &str) -> Result<Resolved<'_>> {
        let mut current = name;
        for _ in 0..MAX_ALIAS_DEPTH {
            let (key, reg) = self
                .fields
                .get_key_value(current)
                .ok_or_else(|| Error::FieldNotFound(name.to_string()))?;
            match &reg.entry {
                FieldEntry::Alias(target) => current = target,
                entry => return Ok(Resolved { name: key, entry, info: &reg.info }),
            }
        }
        Err(Error::Expression(format!("alias cycle while resolving '{name}'")))
    }

    /// Metadata of the field `name` resolves to.
    pub fn info(&self, name: &str) -> Option<&FieldInfo> {
        self.resolve(name).ok().map(|r| r.info)
    }

    /// Raw entry names (canonical, sorted).
    pub fn raw_fields(&self) -> Vec<&str> {
        self.names_where(|e| matches!(e, FieldEntry::Raw))
    }

    /// Derived entry names (sorted).
    pub fn derived_fields(&self) -> Vec<&str> {
        self.names_where(|e| matches!(e, FieldEntry::Derived(_)))
    }

    /// Every registered name, aliases included (sorted).
    pub fn names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Raw fields that `name` ultimately depends on (sorted, deduplicated).
    pub fn raw_prerequisites(&self, name: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        self.collect_raw(name, &mut stack, &mut out)?;
        out.sort();
        out.dedup();
        Ok(out)
    }

    fn collect_raw(
        &self,
        name: &str,
        stack: &mut Vec<String>,
        out: &mut Vec<String>,
    ) -> Result<()> {
        let resolved = self.resolve(name)?;
        match resolved.entry {
            FieldEntry::Raw => out.push(resolved.name.to_string()),
            FieldEntry::Derived(expr) => {
                if stack.iter().any(|s| s == resolved.name) {
                    return Err(Error::Expression(format!(
                        "derived field '{}' depends on itself",
                        resolved.name
                    )));
                }
                stack.push(resolved.name.to_string());
                for dep in &expr.required_fields {
                    self.collect_raw(dep, stack, out)?;
                }
                stack.pop();
            }
            FieldEntry::Alias(_) => unreachable!("resolve() never returns aliases"),
        }
        Ok(())
    }

    fn names_where(&self, pred: impl Fn(&FieldEntry) -> bool) -> Vec<&str> {
        self.fields.iter().filter(|(_, r)| pred(&r.entry)).map(|(k, _)| k.as_str()).collect()
    }

    fn insert(&mut self, entry: FieldEntry, info: FieldInfo) {
        let name = info.name.clone();
        for alias in &info.aliases {
            self.alias(alias.clone(), name.clone());
        }
        self.fields.insert(name, Registered { entry, info });
    }
}
