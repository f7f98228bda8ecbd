//! Runtime lexical environments.
//!
//! Spec §3: "Lifetime is the longest of: (a) the active frame that currently
//! executes in it, and (b) any closure that captured it. Environments may
//! form DAGs via closure capture... implementation must tolerate long
//! retention chains." The teacher's own `Heap`/`HeapId` arena solves the
//! analogous problem for a full Python object graph with cycles; Blocks has
//! no cycles (spec §9), so plain `Rc`/`RefCell` — the "ownership with shared
//! links" option spec §5 explicitly sanctions — is the right-sized tool here
//! instead of reimplementing an arena.

use std::rc::Rc;
use std::cell::RefCell;

use crate::value::Value;

#[derive(Debug)]
struct EnvData {
    values: Vec<Value>,
    parent: Option<Env>,
}

impl Drop for EnvData {
    /// Unlinks the parent chain iteratively instead of relying on the
    /// default recursive drop glide, which would blow the stack on a
    /// sufficiently long uniquely-owned chain (spec §9).
    fn drop(&mut self) {
        let mut next = self.parent.take();
        while let Some(env) = next {
            match Rc::try_unwrap(env.0) {
                Ok(cell) => next = cell.into_inner().parent.take(),
                Err(_) => break,
            }
        }
    }
}

/// A runtime environment: a fixed-size vector of value slots plus a link to
/// the parent environment that was active when this one's owning block was
/// invoked (not the block's *capturing* environment directly — see
/// [`Env::child`]).
#[derive(Debug, Clone)]
pub struct Env(Rc<RefCell<EnvData>>);

impl Env {
    /// The VM's empty root environment, allocated once at construction.
    #[must_use]
    pub fn root() -> Self {
        Self(Rc::new(RefCell::new(EnvData {
            values: Vec::new(),
            parent: None,
        })))
    }

    /// Allocates a new environment with `locals_count` slots, linked to
    /// `parent`. Slots default to `Int 0` (spec §4.5's calling convention:
    /// "extra slots default to `Int 0`"), not `Nil` — a local that's never
    /// written before being read (e.g. an un-taken `if` branch that would
    /// have assigned it) must still support arithmetic on it.
    #[must_use]
    pub fn child(parent: Env, locals_count: usize) -> Self {
        Self(Rc::new(RefCell::new(EnvData {
            values: vec![Value::Int(0); locals_count],
            parent: Some(parent),
        })))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn load(&self, index: usize) -> Value {
        self.0.borrow().values[index].clone()
    }

    pub fn store(&self, index: usize, value: Value) {
        self.0.borrow_mut().values[index] = value;
    }

    /// Walks `hops` parent links, returning `None` if the chain ends early
    /// (a fatal `UpvalueNullParent` fault at the call site — spec §6).
    #[must_use]
    pub fn ancestor(&self, hops: usize) -> Option<Env> {
        let mut cur = self.clone();
        for _ in 0..hops {
            let next = cur.0.borrow().parent.clone()?;
            cur = next;
        }
        Some(cur)
    }

    pub fn set_slot(&self, index: usize, value: Value) {
        self.0.borrow_mut().values[index] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestor_walks_parent_chain() {
        let root = Env::root();
        let mid = Env::child(root.clone(), 1);
        mid.store(0, Value::Int(7));
        let leaf = Env::child(mid.clone(), 1);
        assert_eq!(leaf.ancestor(1).unwrap().load(0), Value::Int(7));
        assert!(leaf.ancestor(5).is_none());
    }

    #[test]
    fn long_chains_do_not_overflow_drop() {
        // A long retention chain must not blow the stack when the head Rc
        // drops (spec §9: implementations must tolerate long chains).
        let mut env = Env::root();
        for _ in 0..200_000 {
            env = Env::child(env, 1);
        }
        drop(env);
    }
}
