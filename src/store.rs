//! Handle tables and reference counts for live environments and programs.
//!
//! Every environment owns a set of callback implementation ids. Each program
//! compiled from it holds one reference on each of those ids, so callbacks
//! stay registered for as long as any program might call them, even after the
//! environment itself was destroyed. An id is released when its count is zero
//! and its environment is destroyed; the environment entry goes away once it
//! is destroyed and no program refers to it.
//!
//! Handles are numbered from monotonic counters and never reused. This lets
//! the store tell a handle that was issued and since removed (destroying it
//! again is a no-op) from one that never existed.
//!
//! The store does no locking of its own; the runtime keeps it behind a single
//! mutex so that check-then-release sequences are atomic.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use celrt_core::{Env, Program, Type};
use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::error::{Error, HandleKind, Result};

macro_rules! handle_id {
    ($name:ident, $prefix:literal, $kind:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                s.strip_prefix($prefix)
                    .and_then(|n| n.parse().ok())
                    .map($name)
                    .ok_or_else(|| Error::not_found($kind, s))
            }
        }
    };
}

handle_id!(EnvId, "env_", HandleKind::Environment);
handle_id!(ProgramId, "prg_", HandleKind::Program);

/// Declared variable types, shared by an environment and its programs.
pub type Variables = Arc<IndexMap<String, Type>>;

pub(crate) struct EnvEntry {
    pub env: Env,
    pub variables: Variables,
    /// Reference count per owned implementation id.
    owned: IndexMap<String, usize>,
    programs: usize,
    destroyed: bool,
    /// Held for the whole of an extend, so concurrent extends apply in turn.
    extending: Arc<Mutex<()>>,
}

#[derive(Clone)]
pub(crate) struct ProgramEntry {
    pub env_id: EnvId,
    pub program: Program,
    pub variables: Variables,
    impl_ids: Vec<String>,
}

#[derive(Default)]
pub(crate) struct HandleStore {
    envs: HashMap<EnvId, EnvEntry>,
    programs: HashMap<ProgramId, ProgramEntry>,
    /// Reserved environment handles whose build failed.
    abandoned: HashSet<u64>,
    last_env: u64,
    last_program: u64,
}

impl HandleStore {
    /// Allocate the handle for an environment about to be built. A reserved
    /// handle that is never filled behaves like a removed one.
    pub fn reserve_env(&mut self) -> EnvId {
        self.last_env += 1;
        EnvId(self.last_env)
    }

    /// Give back a reservation whose environment failed to build. The handle
    /// then reads as never issued.
    pub fn abandon_env(&mut self, id: EnvId) {
        if !self.envs.contains_key(&id) {
            self.abandoned.insert(id.0);
        }
    }

    pub fn insert_env(&mut self, id: EnvId, env: Env, variables: Variables, owned: Vec<String>) {
        let owned = owned.into_iter().map(|impl_id| (impl_id, 0)).collect();
        self.envs.insert(
            id,
            EnvEntry {
                env,
                variables,
                owned,
                programs: 0,
                destroyed: false,
                extending: Arc::default(),
            },
        );
    }

    fn env_issued(&self, id: EnvId) -> bool {
        (1..=self.last_env).contains(&id.0) && !self.abandoned.contains(&id.0)
    }

    fn program_issued(&self, id: ProgramId) -> bool {
        (1..=self.last_program).contains(&id.0)
    }

    /// An environment that can still compile.
    pub fn live_env(&self, id: EnvId) -> Result<&EnvEntry> {
        match self.envs.get(&id) {
            Some(entry) if !entry.destroyed => Ok(entry),
            _ if self.env_issued(id) => Err(Error::destroyed(HandleKind::Environment, id)),
            _ => Err(Error::not_found(HandleKind::Environment, id)),
        }
    }

    /// The lock serializing extends of a live environment.
    pub fn extend_lock(&self, id: EnvId) -> Result<Arc<Mutex<()>>> {
        Ok(Arc::clone(&self.live_env(id)?.extending))
    }

    /// Swap in an extended engine environment, adding newly claimed ids.
    pub fn replace_env(&mut self, id: EnvId, env: Env, claimed: Vec<String>) -> Result<()> {
        self.live_env(id)?;
        if let Some(entry) = self.envs.get_mut(&id) {
            entry.env = env;
            for impl_id in claimed {
                entry.owned.entry(impl_id).or_insert(0);
            }
        }
        Ok(())
    }

    /// Publish a program compiled from `env_id`, taking a reference on every
    /// id the environment owns.
    pub fn insert_program(&mut self, env_id: EnvId, program: Program) -> Result<ProgramId> {
        self.live_env(env_id)?;
        let Some(entry) = self.envs.get_mut(&env_id) else {
            return Err(Error::destroyed(HandleKind::Environment, env_id));
        };
        for count in entry.owned.values_mut() {
            *count += 1;
        }
        entry.programs += 1;
        let impl_ids = entry.owned.keys().cloned().collect();
        let variables = Arc::clone(&entry.variables);

        self.last_program += 1;
        let id = ProgramId(self.last_program);
        self.programs.insert(
            id,
            ProgramEntry {
                env_id,
                program,
                variables,
                impl_ids,
            },
        );
        Ok(id)
    }

    pub fn program(&self, id: ProgramId) -> Result<&ProgramEntry> {
        match self.programs.get(&id) {
            Some(entry) => Ok(entry),
            None if self.program_issued(id) => Err(Error::destroyed(HandleKind::Program, id)),
            None => Err(Error::not_found(HandleKind::Program, id)),
        }
    }

    /// Mark an environment destroyed. Returns the ids that no longer have an
    /// owner and should be unregistered.
    pub fn destroy_env(&mut self, id: EnvId) -> Result<Vec<String>> {
        let issued = self.env_issued(id);
        match self.envs.get_mut(&id) {
            Some(entry) => entry.destroyed = true,
            None if issued => return Ok(Vec::new()),
            None => return Err(Error::not_found(HandleKind::Environment, id)),
        }
        Ok(self.release(id))
    }

    /// Remove a program and drop its references. Returns the ids that no
    /// longer have an owner and should be unregistered.
    ///
    /// An id is released only once its count is zero and its environment has
    /// been destroyed. Destroying the last program of a live environment
    /// releases nothing, since the environment can still compile programs
    /// that call it.
    pub fn destroy_program(&mut self, id: ProgramId) -> Result<Vec<String>> {
        let Some(program) = self.programs.remove(&id) else {
            return if self.program_issued(id) {
                Ok(Vec::new())
            } else {
                Err(Error::not_found(HandleKind::Program, id))
            };
        };
        if let Some(entry) = self.envs.get_mut(&program.env_id) {
            entry.programs = entry.programs.saturating_sub(1);
            for impl_id in &program.impl_ids {
                if let Some(count) = entry.owned.get_mut(impl_id) {
                    *count = count.saturating_sub(1);
                }
            }
        }
        Ok(self.release(program.env_id))
    }

    fn release(&mut self, id: EnvId) -> Vec<String> {
        let Some(entry) = self.envs.get_mut(&id) else {
            return Vec::new();
        };
        if !entry.destroyed {
            return Vec::new();
        }
        let released: Vec<String> = entry
            .owned
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(impl_id, _)| impl_id.clone())
            .collect();
        for impl_id in &released {
            entry.owned.shift_remove(impl_id);
        }
        if entry.programs == 0 {
            self.envs.remove(&id);
            tracing::debug!(env_id = %id, "environment removed");
        }
        released
            .into_iter()
            .filter(|impl_id| !self.is_owned(impl_id))
            .collect()
    }

    /// Whether any environment entry still owns `impl_id`.
    pub fn is_owned(&self, impl_id: &str) -> bool {
        self.envs.values().any(|entry| entry.owned.contains_key(impl_id))
    }

    /// Current count of `impl_id` on `env_id`, if the environment owns it.
    pub fn ref_count(&self, env_id: EnvId, impl_id: &str) -> Option<usize> {
        self.envs.get(&env_id)?.owned.get(impl_id).copied()
    }

    pub fn env_count(&self) -> usize {
        self.envs.len()
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use celrt_core::Env;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn env() -> Env {
        Env::new([]).unwrap()
    }

    fn program() -> Program {
        let env = env();
        env.program(env.compile("1").unwrap()).unwrap()
    }

    fn insert(store: &mut HandleStore, owned: &[&str]) -> EnvId {
        let owned = owned.iter().map(|s| s.to_string()).collect();
        let id = store.reserve_env();
        store.insert_env(id, env(), Arc::default(), owned);
        id
    }

    #[test]
    fn test_handle_ids_display_and_parse() {
        assert_eq!(EnvId(3).to_string(), "env_3");
        assert_eq!("prg_12".parse::<ProgramId>().unwrap(), ProgramId(12));
        assert!("env_x".parse::<EnvId>().is_err());
        assert!("prg_1".parse::<EnvId>().is_err());
    }

    #[test]
    fn test_immediate_cleanup_without_programs() {
        let mut store = HandleStore::default();
        let id = insert(&mut store, &["a", "b"]);
        assert_eq!(store.destroy_env(id).unwrap(), vec!["a", "b"]);
        assert_eq!(store.env_count(), 0);
    }

    #[test]
    fn test_programs_keep_callbacks_alive() {
        let mut store = HandleStore::default();
        let env_id = insert(&mut store, &["a"]);
        let first = store.insert_program(env_id, program()).unwrap();
        let second = store.insert_program(env_id, program()).unwrap();
        assert_eq!(store.ref_count(env_id, "a"), Some(2));

        assert!(store.destroy_env(env_id).unwrap().is_empty());
        assert!(matches!(store.live_env(env_id), Err(Error::AlreadyDestroyed { .. })));
        assert!(store.program(first).is_ok());

        assert!(store.destroy_program(first).unwrap().is_empty());
        assert_eq!(store.ref_count(env_id, "a"), Some(1));
        assert_eq!(store.destroy_program(second).unwrap(), vec!["a"]);
        assert_eq!(store.env_count(), 0);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut store = HandleStore::default();
        let env_id = insert(&mut store, &["a"]);
        let first = store.insert_program(env_id, program()).unwrap();
        let second = store.insert_program(env_id, program()).unwrap();
        store.destroy_env(env_id).unwrap();
        store.destroy_env(env_id).unwrap();

        store.destroy_program(first).unwrap();
        assert!(store.destroy_program(first).unwrap().is_empty());
        assert_eq!(store.ref_count(env_id, "a"), Some(1));
        assert_eq!(store.destroy_program(second).unwrap(), vec!["a"]);
        assert!(store.destroy_env(env_id).unwrap().is_empty());
    }

    #[test]
    fn test_never_issued_handles() {
        let mut store = HandleStore::default();
        assert!(matches!(store.destroy_env(EnvId(1)), Err(Error::NotFound { .. })));
        assert!(matches!(store.destroy_program(ProgramId(7)), Err(Error::NotFound { .. })));
        assert!(matches!(store.live_env(EnvId(0)), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_abandoned_reservation_reads_as_never_issued() {
        let mut store = HandleStore::default();
        let failed = store.reserve_env();
        store.abandon_env(failed);
        assert!(matches!(store.live_env(failed), Err(Error::NotFound { .. })));
        assert!(matches!(store.destroy_env(failed), Err(Error::NotFound { .. })));

        let next = insert(&mut store, &[]);
        assert_ne!(next, failed);
        store.destroy_env(next).unwrap();
        assert!(matches!(store.live_env(next), Err(Error::AlreadyDestroyed { .. })));
    }

    #[test]
    fn test_last_program_of_live_env_releases_nothing() {
        let mut store = HandleStore::default();
        let env_id = insert(&mut store, &["a"]);
        let program_id = store.insert_program(env_id, program()).unwrap();
        assert!(store.destroy_program(program_id).unwrap().is_empty());
        assert_eq!(store.ref_count(env_id, "a"), Some(0));
        assert_eq!(store.destroy_env(env_id).unwrap(), vec!["a"]);
    }

    #[test]
    fn test_shared_ids_outlive_one_owner() {
        let mut store = HandleStore::default();
        let first = insert(&mut store, &["shared", "mine"]);
        let second = insert(&mut store, &["shared"]);
        assert_eq!(store.destroy_env(first).unwrap(), vec!["mine"]);
        assert!(store.is_owned("shared"));
        assert_eq!(store.destroy_env(second).unwrap(), vec!["shared"]);
    }

    #[test]
    fn test_ids_claimed_after_compile_are_not_counted_by_older_programs() {
        let mut store = HandleStore::default();
        let env_id = insert(&mut store, &["f"]);
        let program_id = store.insert_program(env_id, program()).unwrap();
        store.replace_env(env_id, env(), vec!["v".into()]).unwrap();
        assert_eq!(store.ref_count(env_id, "v"), Some(0));

        assert_eq!(store.destroy_env(env_id).unwrap(), vec!["v"]);
        assert_eq!(store.destroy_program(program_id).unwrap(), vec!["f"]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        CreateEnv(Vec<u8>),
        Compile(usize),
        DestroyEnv(usize),
        DestroyProgram(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            prop::collection::vec(0u8..4, 0..3).prop_map(Op::CreateEnv),
            any::<usize>().prop_map(Op::Compile),
            any::<usize>().prop_map(Op::DestroyEnv),
            any::<usize>().prop_map(Op::DestroyProgram),
        ]
    }

    proptest! {
        #[test]
        fn prop_refcounts_survive_any_destroy_order(ops in prop::collection::vec(op(), 1..40)) {
            let mut store = HandleStore::default();
            let mut envs: Vec<(EnvId, Vec<String>)> = Vec::new();
            let mut programs: Vec<(ProgramId, EnvId)> = Vec::new();
            let mut destroyed: Vec<EnvId> = Vec::new();

            for op in ops {
                match op {
                    Op::CreateEnv(ids) => {
                        let mut owned: Vec<String> = ids.iter().map(|i| format!("f{}", i)).collect();
                        owned.sort();
                        owned.dedup();
                        let id = store.reserve_env();
                        store.insert_env(id, env(), Arc::default(), owned.clone());
                        envs.push((id, owned));
                    }
                    Op::Compile(i) if !envs.is_empty() => {
                        let (env_id, _) = envs[i % envs.len()];
                        match store.insert_program(env_id, program()) {
                            Ok(id) => {
                                prop_assert!(!destroyed.contains(&env_id));
                                programs.push((id, env_id));
                            }
                            Err(_) => prop_assert!(destroyed.contains(&env_id)),
                        }
                    }
                    Op::DestroyEnv(i) if !envs.is_empty() => {
                        let (env_id, _) = envs[i % envs.len()];
                        for released in store.destroy_env(env_id).unwrap() {
                            prop_assert!(!store.is_owned(&released));
                        }
                        destroyed.push(env_id);
                    }
                    Op::DestroyProgram(i) if !programs.is_empty() => {
                        let (program_id, _) = programs.remove(i % programs.len());
                        for released in store.destroy_program(program_id).unwrap() {
                            prop_assert!(!store.is_owned(&released));
                        }
                    }
                    _ => {}
                }

                // Every live program keeps its environment's ids counted.
                for (env_id, owned) in &envs {
                    let live = programs.iter().filter(|(_, e)| e == env_id).count();
                    for impl_id in owned {
                        match store.ref_count(*env_id, impl_id) {
                            Some(count) => prop_assert_eq!(count, live),
                            None => prop_assert!(live == 0 && destroyed.contains(env_id)),
                        }
                    }
                    if live > 0 {
                        prop_assert!(programs.iter().all(|(p, _)| store.program(*p).is_ok()));
                    }
                }
            }

            for (program_id, _) in programs.drain(..) {
                store.destroy_program(program_id).unwrap();
            }
            for (env_id, _) in &envs {
                store.destroy_env(*env_id).unwrap();
            }
            prop_assert_eq!(store.env_count(), 0);
            prop_assert_eq!(store.program_count(), 0);
        }
    }
}
