//! Handle table

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ferry_sdk::{HostError, ObjectRef};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use super::cleanup::PendingTeardown;
use super::{HandleEntry, HandleInfo, HandleKind, HandleValue, LookupMode};
use crate::error::{EngineError, EngineResult};
use crate::flags::ObjectFlags;
use crate::native::{CallBinding, NativeModule};
use crate::settings::HandleSettings;

#[derive(Default)]
pub(super) struct Table {
    pub entries: FxHashMap<String, HandleEntry>,
    pub aliases: FxHashMap<String, String>,
}

impl Table {
    fn resolve(&self, name: &str) -> Option<String> {
        if self.entries.contains_key(name) {
            return Some(name.to_string());
        }
        if let Some(target) = self.aliases.get(name) {
            if self.entries.contains_key(target) {
                return Some(target.clone());
            }
        }
        self.entries
            .values()
            .find(|e| e.flags.contains(ObjectFlags::NO_CASE) && e.name.eq_ignore_ascii_case(name))
            .map(|e| e.name.clone())
    }

    fn name_taken(&self, name: &str) -> bool {
        self.entries.contains_key(name) || self.aliases.contains_key(name)
    }

    /// Remove an entry and, unless sticky, its alias
    pub(super) fn take(&mut self, name: &str) -> Option<HandleEntry> {
        let entry = self.entries.remove(name)?;
        if let Some(alias) = &entry.alias {
            if !entry.flags.contains(ObjectFlags::STICKY_ALIAS) {
                self.aliases.remove(alias);
            }
        }
        Some(entry)
    }

    /// Put back an entry removed by `take`
    pub(super) fn restore(&mut self, entry: HandleEntry) {
        if let Some(alias) = &entry.alias {
            self.aliases.insert(alias.clone(), entry.name.clone());
        }
        self.entries.insert(entry.name.clone(), entry);
    }
}

/// Tear down the value behind a removed handle.
///
/// Returns whether a teardown actually happened.
pub(super) fn teardown(
    name: &str,
    value: &HandleValue,
    flags: ObjectFlags,
    force_dispose: Option<bool>,
) -> Result<bool, HostError> {
    match value {
        HandleValue::Object(obj) => {
            let dispose = force_dispose.unwrap_or(!flags.contains(ObjectFlags::NO_DISPOSE));
            if !dispose {
                log::trace!(target: "ferry::handles", "{} removed without dispose", name);
                return Ok(false);
            }
            obj.dispose()
        }
        HandleValue::Module(module) => Ok(module.release()),
        HandleValue::Binding(binding) => Ok(binding.unresolve()),
    }
}

/// Registry of named foreign values
pub struct HandleRegistry {
    pub(super) table: RwLock<Table>,
    pub(super) pending: Mutex<Vec<PendingTeardown>>,
    next_id: AtomicU64,
    module_prefix: String,
    binding_prefix: String,
}

impl std::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("handles", &self.len())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new(&HandleSettings::default())
    }
}

impl HandleRegistry {
    /// Create an empty registry
    pub fn new(settings: &HandleSettings) -> Self {
        Self {
            table: RwLock::new(Table::default()),
            pending: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            module_prefix: settings.module_prefix.clone(),
            binding_prefix: settings.binding_prefix.clone(),
        }
    }

    fn generate_name(&self, value: &HandleValue, id: u64) -> String {
        match value {
            HandleValue::Object(obj) => format!("{}#{}", obj.type_name().replace('.', "#"), id),
            HandleValue::Module(_) => format!("{}#{}", self.module_prefix, id),
            HandleValue::Binding(_) => format!("{}#{}", self.binding_prefix, id),
        }
    }

    /// Register a value and return its handle name.
    ///
    /// New handles start with no references.
    pub fn create(
        &self,
        value: HandleValue,
        flags: ObjectFlags,
        name: Option<&str>,
    ) -> EngineResult<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = match name {
            Some(n) if n.trim().is_empty() => {
                return Err(EngineError::invalid("handle name cannot be empty"))
            }
            Some(n) => n.to_string(),
            None => self.generate_name(&value, id),
        };

        let mut table = self.table.write();
        Self::insert(&mut table, name, id, value, flags)
    }

    fn insert(
        table: &mut Table,
        name: String,
        id: u64,
        value: HandleValue,
        flags: ObjectFlags,
    ) -> EngineResult<String> {
        if table.name_taken(&name) {
            return Err(EngineError::HandleExists { name });
        }
        log::debug!(target: "ferry::handles", "created {} ({:?}, {})", name, value, flags);
        table.entries.insert(
            name.clone(),
            HandleEntry {
                name: name.clone(),
                value,
                ref_count: 0,
                flags,
                alias: None,
                id,
            },
        );
        Ok(name)
    }

    /// Register `module` unless a mapped module for the same path already
    /// has a handle.
    ///
    /// The lookup and the insert happen under one write lock. Returns the
    /// handle name and whether it was newly created; when an existing
    /// handle wins, `module` is released.
    pub fn create_module_if_absent(
        &self,
        module: Arc<NativeModule>,
        flags: ObjectFlags,
        name: Option<&str>,
    ) -> EngineResult<(String, bool)> {
        if matches!(name, Some(n) if n.trim().is_empty()) {
            module.release();
            return Err(EngineError::invalid("handle name cannot be empty"));
        }
        let mut table = self.table.write();
        let same_file = |m: &Arc<NativeModule>| {
            m.path() == module.path() || m.requested_path() == module.requested_path()
        };
        let existing = table
            .entries
            .values()
            .filter(|e| matches!(&e.value, HandleValue::Module(m) if m.is_loaded() && same_file(m)))
            .min_by_key(|e| e.id)
            .map(|e| e.name.clone());
        if let Some(existing) = existing {
            drop(table);
            module.release();
            return Ok((existing, false));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let value = HandleValue::Module(Arc::clone(&module));
        let name = match name {
            Some(n) => n.to_string(),
            None => self.generate_name(&value, id),
        };
        match Self::insert(&mut table, name, id, value, flags) {
            Ok(name) => Ok((name, true)),
            Err(e) => {
                drop(table);
                module.release();
                Err(e)
            }
        }
    }

    /// Whether a handle (or alias) exists
    pub fn exists(&self, name: &str) -> bool {
        self.table.read().resolve(name).is_some()
    }

    /// Canonical handle name for a handle name or alias
    pub fn resolve_name(&self, name: &str) -> Option<String> {
        self.table.read().resolve(name)
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.table.read().entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value behind a handle
    pub fn value(&self, name: &str) -> EngineResult<HandleValue> {
        let table = self.table.read();
        table
            .resolve(name)
            .and_then(|n| table.entries.get(&n))
            .map(|e| e.value.clone())
            .ok_or_else(|| EngineError::HandleNotFound {
                name: name.to_string(),
            })
    }

    /// Host object behind an object handle
    pub fn object(&self, name: &str) -> EngineResult<ObjectRef> {
        match self.value(name)? {
            HandleValue::Object(obj) => Ok(obj),
            other => Err(EngineError::WrongHandleKind {
                name: name.to_string(),
                expected: HandleKind::Object,
                actual: other.kind(),
            }),
        }
    }

    /// Native module behind a module handle
    pub fn module(&self, name: &str) -> EngineResult<Arc<NativeModule>> {
        match self.value(name)? {
            HandleValue::Module(module) => Ok(module),
            other => Err(EngineError::WrongHandleKind {
                name: name.to_string(),
                expected: HandleKind::Module,
                actual: other.kind(),
            }),
        }
    }

    /// Call binding behind a binding handle
    pub fn binding(&self, name: &str) -> EngineResult<Arc<CallBinding>> {
        match self.value(name)? {
            HandleValue::Binding(binding) => Ok(binding),
            other => Err(EngineError::WrongHandleKind {
                name: name.to_string(),
                expected: HandleKind::CallBinding,
                actual: other.kind(),
            }),
        }
    }

    /// Snapshot of one entry
    pub fn info(&self, name: &str) -> EngineResult<HandleInfo> {
        let table = self.table.read();
        table
            .resolve(name)
            .and_then(|n| table.entries.get(&n))
            .map(HandleEntry::info)
            .ok_or_else(|| EngineError::HandleNotFound {
                name: name.to_string(),
            })
    }

    /// Existing handle for the same host object, if any
    pub fn find_object(&self, object: &ObjectRef) -> Option<String> {
        let table = self.table.read();
        table
            .entries
            .values()
            .filter(|e| matches!(&e.value, HandleValue::Object(o) if Arc::ptr_eq(o, object)))
            .min_by_key(|e| e.id)
            .map(|e| e.name.clone())
    }

    /// Existing handle of a still-mapped module loaded from `path`
    pub fn find_module_by_path(&self, path: &str) -> Option<String> {
        let table = self.table.read();
        table
            .entries
            .values()
            .filter(|e| {
                matches!(&e.value, HandleValue::Module(m)
                    if m.is_loaded() && (m.path() == path || m.requested_path() == path))
            })
            .min_by_key(|e| e.id)
            .map(|e| e.name.clone())
    }

    /// Handles of call bindings currently bound to `module`
    pub fn bindings_of(&self, module: &Arc<NativeModule>) -> Vec<String> {
        let table = self.table.read();
        let mut found: Vec<(u64, String)> = table
            .entries
            .values()
            .filter(|e| matches!(&e.value, HandleValue::Binding(b) if b.is_bound_to(module)))
            .map(|e| (e.id, e.name.clone()))
            .collect();
        found.sort_unstable();
        found.into_iter().map(|(_, n)| n).collect()
    }

    fn lookup_mut<'t>(
        table: &'t mut Table,
        name: &str,
        mode: LookupMode,
    ) -> EngineResult<Option<&'t mut HandleEntry>> {
        match table.resolve(name) {
            Some(canonical) => Ok(table.entries.get_mut(&canonical)),
            None if mode == LookupMode::Optional => Ok(None),
            None => Err(EngineError::HandleNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Add a reference. Locked handles keep their count.
    ///
    /// Returns the new count, or `None` for a missing handle in optional mode.
    pub fn add_ref(&self, name: &str, mode: LookupMode) -> EngineResult<Option<usize>> {
        let mut table = self.table.write();
        let Some(entry) = Self::lookup_mut(&mut table, name, mode)? else {
            return Ok(None);
        };
        if !entry.is_locked() {
            entry.ref_count += 1;
        }
        log::trace!(target: "ferry::handles", "addref {} -> {}", entry.name, entry.ref_count);
        Ok(Some(entry.ref_count))
    }

    /// Remove a reference. Locked handles keep their count.
    ///
    /// An `AutoDispose` handle whose count drops to zero is removed and its
    /// teardown queued for [`HandleRegistry::flush_pending`].
    pub fn remove_ref(&self, name: &str, mode: LookupMode) -> EngineResult<Option<usize>> {
        let mut table = self.table.write();
        let Some(entry) = Self::lookup_mut(&mut table, name, mode)? else {
            return Ok(None);
        };
        if !entry.is_locked() {
            entry.ref_count = entry.ref_count.saturating_sub(1);
        }
        let count = entry.ref_count;
        let canonical = entry.name.clone();
        let expired =
            count == 0 && entry.flags.contains(ObjectFlags::AUTO_DISPOSE) && !entry.is_locked();
        log::trace!(target: "ferry::handles", "removeref {} -> {}", canonical, count);

        let queued = if expired { table.take(&canonical) } else { None };
        drop(table);
        if let Some(entry) = queued {
            log::debug!(target: "ferry::handles", "{} queued for disposal", canonical);
            self.pending.lock().push(PendingTeardown::from_entry(entry, None));
        }
        Ok(Some(count))
    }

    /// Give a handle an alias. The alias holds one reference.
    pub fn alias(&self, name: &str, alias: &str) -> EngineResult<String> {
        if alias.trim().is_empty() || alias.chars().any(char::is_whitespace) {
            return Err(EngineError::AliasCreationFailed {
                name: name.to_string(),
                reason: format!("\"{}\" is not a valid alias name", alias),
            });
        }
        let mut table = self.table.write();
        let canonical = table.resolve(name).ok_or_else(|| EngineError::HandleNotFound {
            name: name.to_string(),
        })?;
        if table.name_taken(alias) {
            return Err(EngineError::AliasExists {
                alias: alias.to_string(),
            });
        }
        let Some(entry) = table.entries.get_mut(&canonical) else {
            return Err(EngineError::HandleNotFound { name: canonical });
        };
        if let Some(existing) = &entry.alias {
            return Err(EngineError::AliasCreationFailed {
                name: canonical.clone(),
                reason: format!("handle already has alias \"{}\"", existing),
            });
        }
        entry.alias = Some(alias.to_string());
        if !entry.is_locked() {
            entry.ref_count += 1;
        }
        table.aliases.insert(alias.to_string(), canonical.clone());
        log::debug!(target: "ferry::handles", "aliased {} as {}", canonical, alias);
        Ok(alias.to_string())
    }

    /// Remove an alias and its reference. Returns the handle name.
    pub fn remove_alias(&self, alias: &str) -> EngineResult<String> {
        let mut table = self.table.write();
        let target = table
            .aliases
            .remove(alias)
            .ok_or_else(|| EngineError::HandleNotFound {
                name: alias.to_string(),
            })?;
        if let Some(entry) = table.entries.get_mut(&target) {
            entry.alias = None;
            if !entry.is_locked() {
                entry.ref_count = entry.ref_count.saturating_sub(1);
            }
        }
        Ok(target)
    }

    /// Current flags of a handle
    pub fn flags(&self, name: &str) -> EngineResult<ObjectFlags> {
        self.info(name).map(|i| i.flags)
    }

    /// Replace the flags of a handle, returning the previous ones
    pub fn set_flags(&self, name: &str, flags: ObjectFlags) -> EngineResult<ObjectFlags> {
        let mut table = self.table.write();
        let entry = Self::lookup_mut(&mut table, name, LookupMode::Demand)?.ok_or_else(|| {
            EngineError::HandleNotFound {
                name: name.to_string(),
            }
        })?;
        let previous = entry.flags;
        entry.flags = flags;
        Ok(previous)
    }

    /// Remove a handle and tear down its value.
    ///
    /// `force_dispose` overrides the handle's `NoDispose` flag either way.
    /// Fails with `HandleInUse` while references remain. If teardown fails
    /// the handle is restored. Returns whether a teardown ran.
    pub fn dispose(&self, name: &str, force_dispose: Option<bool>) -> EngineResult<bool> {
        let entry = {
            let mut table = self.table.write();
            let canonical = table.resolve(name).ok_or_else(|| EngineError::HandleNotFound {
                name: name.to_string(),
            })?;
            if let Some(entry) = table.entries.get(&canonical) {
                if entry.ref_count > 0 {
                    return Err(EngineError::HandleInUse {
                        name: canonical,
                        ref_count: entry.ref_count,
                    });
                }
            }
            table.take(&canonical).ok_or_else(|| EngineError::HandleNotFound {
                name: name.to_string(),
            })?
        };

        match teardown(&entry.name, &entry.value, entry.flags, force_dispose) {
            Ok(disposed) => {
                log::debug!(
                    target: "ferry::handles",
                    "removed {} (disposed: {})",
                    entry.name,
                    disposed
                );
                Ok(disposed)
            }
            Err(source) => {
                let name = entry.name.clone();
                log::warn!(target: "ferry::handles", "dispose of {} failed: {}", name, source);
                self.table.write().restore(entry);
                Err(EngineError::DisposeFailed { name, source })
            }
        }
    }

    /// Remove a handle without tearing down its value
    pub fn forget(&self, name: &str) -> EngineResult<HandleValue> {
        let mut table = self.table.write();
        let canonical = table.resolve(name).ok_or_else(|| EngineError::HandleNotFound {
            name: name.to_string(),
        })?;
        table
            .take(&canonical)
            .map(|e| e.value)
            .ok_or(EngineError::HandleNotFound { name: canonical })
    }

    /// Handle names matching a glob pattern, in creation order
    pub fn list(
        &self,
        pattern: Option<&str>,
        kind: Option<HandleKind>,
    ) -> EngineResult<Vec<String>> {
        let pattern = pattern
            .map(glob::Pattern::new)
            .transpose()
            .map_err(|e| EngineError::invalid(format!("bad pattern: {}", e)))?;
        let table = self.table.read();
        let mut found: Vec<(u64, String)> = table
            .entries
            .values()
            .filter(|e| kind.is_none_or(|k| e.value.kind() == k))
            .filter(|e| pattern.as_ref().is_none_or(|p| p.matches(&e.name)))
            .map(|e| (e.id, e.name.clone()))
            .collect();
        found.sort_unstable();
        Ok(found.into_iter().map(|(_, n)| n).collect())
    }

    /// Release the references held by temporary return values.
    ///
    /// Returns how many handles were released.
    pub fn remove_temporary_references(&self) -> usize {
        let mut table = self.table.write();
        let mut released = 0;
        let mut expired = Vec::new();
        for entry in table.entries.values_mut() {
            if entry.flags.contains(ObjectFlags::TEMPORARY_RETURN_REFERENCE) {
                entry.flags = entry.flags.difference(ObjectFlags::TEMPORARY_RETURN_REFERENCE);
                if entry.ref_count > 0 && !entry.is_locked() {
                    entry.ref_count -= 1;
                    if entry.ref_count == 0 && entry.flags.contains(ObjectFlags::AUTO_DISPOSE) {
                        expired.push(entry.name.clone());
                    }
                }
                released += 1;
            }
        }
        let queued: Vec<HandleEntry> = expired.iter().filter_map(|name| table.take(name)).collect();
        drop(table);
        if !queued.is_empty() {
            log::debug!(
                target: "ferry::handles",
                "{} temporary handles queued for disposal",
                queued.len()
            );
            self.pending
                .lock()
                .extend(queued.into_iter().map(|entry| PendingTeardown::from_entry(entry, None)));
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_sdk::HostObject;
    use std::any::Any;
    use std::sync::atomic::AtomicUsize;

    struct Widget {
        disposed: AtomicUsize,
        fail: bool,
    }

    impl Widget {
        fn new(fail: bool) -> ObjectRef {
            Arc::new(Widget {
                disposed: AtomicUsize::new(0),
                fail,
            })
        }
    }

    impl HostObject for Widget {
        fn type_name(&self) -> &str {
            "Demo.Widget"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn dispose(&self) -> Result<bool, HostError> {
            if self.fail {
                return Err(HostError::disposed("Demo.Widget"));
            }
            self.disposed.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    fn disposed_count(obj: &ObjectRef) -> usize {
        ferry_sdk::downcast::<Widget>(obj)
            .map(|w| w.disposed.load(Ordering::SeqCst))
            .unwrap_or_default()
    }

    #[test]
    fn test_generated_names() {
        let registry = HandleRegistry::default();
        let a = registry
            .create(HandleValue::Object(Widget::new(false)), ObjectFlags::NONE, None)
            .unwrap();
        let b = registry
            .create(HandleValue::Object(Widget::new(false)), ObjectFlags::NONE, None)
            .unwrap();
        assert!(a.starts_with("Demo#Widget#"));
        assert_ne!(a, b);
        assert_eq!(registry.info(&a).unwrap().ref_count, 0);
        assert_eq!(registry.list(None, None).unwrap(), vec![a, b]);
    }

    #[test]
    fn test_explicit_name_conflict() {
        let registry = HandleRegistry::default();
        registry
            .create(HandleValue::Object(Widget::new(false)), ObjectFlags::NONE, Some("w"))
            .unwrap();
        let err = registry
            .create(HandleValue::Object(Widget::new(false)), ObjectFlags::NONE, Some("w"))
            .unwrap_err();
        assert!(matches!(err, EngineError::HandleExists { .. }));
    }

    #[test]
    fn test_ref_counting() {
        let registry = HandleRegistry::default();
        let name = registry
            .create(HandleValue::Object(Widget::new(false)), ObjectFlags::NONE, None)
            .unwrap();
        assert_eq!(registry.add_ref(&name, LookupMode::Demand).unwrap(), Some(1));
        assert_eq!(registry.remove_ref(&name, LookupMode::Demand).unwrap(), Some(0));
        assert_eq!(registry.remove_ref(&name, LookupMode::Demand).unwrap(), Some(0));
        assert!(registry.remove_ref("missing", LookupMode::Demand).is_err());
        assert_eq!(registry.remove_ref("missing", LookupMode::Optional).unwrap(), None);
    }

    #[test]
    fn test_locked_counts_unchanged() {
        let registry = HandleRegistry::default();
        let name = registry
            .create(HandleValue::Object(Widget::new(false)), ObjectFlags::LOCKED, None)
            .unwrap();
        assert_eq!(registry.add_ref(&name, LookupMode::Demand).unwrap(), Some(0));
    }

    #[test]
    fn test_dispose_in_use_and_teardown() {
        let registry = HandleRegistry::default();
        let obj = Widget::new(false);
        let name = registry
            .create(HandleValue::Object(obj.clone()), ObjectFlags::NONE, None)
            .unwrap();
        registry.add_ref(&name, LookupMode::Demand).unwrap();
        assert!(matches!(
            registry.dispose(&name, None),
            Err(EngineError::HandleInUse { ref_count: 1, .. })
        ));
        registry.remove_ref(&name, LookupMode::Demand).unwrap();
        assert!(registry.dispose(&name, None).unwrap());
        assert_eq!(disposed_count(&obj), 1);
        assert!(!registry.exists(&name));
    }

    #[test]
    fn test_no_dispose_and_force() {
        let registry = HandleRegistry::default();
        let obj = Widget::new(false);
        let a = registry
            .create(HandleValue::Object(obj.clone()), ObjectFlags::NO_DISPOSE, None)
            .unwrap();
        assert!(!registry.dispose(&a, None).unwrap());
        assert_eq!(disposed_count(&obj), 0);

        let b = registry
            .create(HandleValue::Object(obj.clone()), ObjectFlags::NO_DISPOSE, None)
            .unwrap();
        assert!(registry.dispose(&b, Some(true)).unwrap());
        assert_eq!(disposed_count(&obj), 1);
    }

    #[test]
    fn test_failed_dispose_restores_handle() {
        let registry = HandleRegistry::default();
        let name = registry
            .create(HandleValue::Object(Widget::new(true)), ObjectFlags::NONE, None)
            .unwrap();
        registry.alias(&name, "w").unwrap();
        registry.remove_ref(&name, LookupMode::Demand).unwrap();
        let err = registry.dispose("w", None).unwrap_err();
        assert!(matches!(err, EngineError::DisposeFailed { .. }));
        assert!(registry.exists(&name));
        assert_eq!(registry.resolve_name("w").as_deref(), Some(name.as_str()));
    }

    #[test]
    fn test_alias_rules() {
        let registry = HandleRegistry::default();
        let name = registry
            .create(HandleValue::Object(Widget::new(false)), ObjectFlags::NONE, None)
            .unwrap();
        registry.alias(&name, "w").unwrap();
        assert_eq!(registry.info("w").unwrap().ref_count, 1);
        assert!(matches!(
            registry.alias(&name, "w2"),
            Err(EngineError::AliasCreationFailed { .. })
        ));
        assert!(matches!(registry.alias(&name, " "), Err(EngineError::AliasCreationFailed { .. })));

        let other = registry
            .create(HandleValue::Object(Widget::new(false)), ObjectFlags::NONE, None)
            .unwrap();
        assert!(matches!(registry.alias(&other, "w"), Err(EngineError::AliasExists { .. })));

        assert_eq!(registry.remove_alias("w").unwrap(), name);
        assert_eq!(registry.info(&name).unwrap().ref_count, 0);
    }

    #[test]
    fn test_find_object_reuses_handle() {
        let registry = HandleRegistry::default();
        let obj = Widget::new(false);
        let name = registry
            .create(HandleValue::Object(obj.clone()), ObjectFlags::NONE, None)
            .unwrap();
        assert_eq!(registry.find_object(&obj), Some(name));
        assert_eq!(registry.find_object(&Widget::new(false)), None);
    }

    #[test]
    fn test_list_pattern_and_temporaries() {
        let registry = HandleRegistry::default();
        let a = registry
            .create(
                HandleValue::Object(Widget::new(false)),
                ObjectFlags::TEMPORARY_RETURN_REFERENCE,
                Some("temp1"),
            )
            .unwrap();
        registry
            .create(HandleValue::Object(Widget::new(false)), ObjectFlags::NONE, Some("keep"))
            .unwrap();
        registry.add_ref(&a, LookupMode::Demand).unwrap();
        assert_eq!(registry.list(Some("temp*"), None).unwrap(), vec!["temp1"]);
        assert!(registry.list(Some("["), None).is_err());
        assert_eq!(registry.remove_temporary_references(), 1);
        assert_eq!(registry.info(&a).unwrap().ref_count, 0);
        assert_eq!(registry.remove_temporary_references(), 0);
    }

    #[test]
    fn test_auto_dispose_queues_teardown() {
        let registry = HandleRegistry::default();
        let obj = Widget::new(false);
        let name = registry
            .create(HandleValue::Object(obj.clone()), ObjectFlags::AUTO_DISPOSE, None)
            .unwrap();
        registry.add_ref(&name, LookupMode::Demand).unwrap();
        registry.remove_ref(&name, LookupMode::Demand).unwrap();
        assert!(!registry.exists(&name));
        assert_eq!(disposed_count(&obj), 0);
        let report = registry.flush_pending();
        assert_eq!(report.disposed, 1);
        assert_eq!(disposed_count(&obj), 1);
    }

    #[test]
    fn test_released_temporary_auto_dispose_is_queued() {
        let registry = HandleRegistry::default();
        let obj = Widget::new(false);
        let flags = ObjectFlags::AUTO_DISPOSE | ObjectFlags::TEMPORARY_RETURN_REFERENCE;
        let name = registry.create(HandleValue::Object(obj.clone()), flags, None).unwrap();
        registry.add_ref(&name, LookupMode::Demand).unwrap();
        assert_eq!(registry.remove_temporary_references(), 1);
        assert!(!registry.exists(&name));
        assert_eq!(registry.pending_len(), 1);
        assert_eq!(registry.flush_pending().disposed, 1);
        assert_eq!(disposed_count(&obj), 1);
    }
}
