use std::collections::BTreeMap;

use camber_types::Document;
use tracing::debug;
use uuid::Uuid;

use crate::sync::{RegKey, RegValue, RegisterOp, Stamp, Update};

/// Origin tag attached to every committed transaction.
///
/// The rebuild scheduler keys off this: its own solver write-backs and
/// in-flight remote merges must not retrigger a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A user-initiated local edit.
    Local,
    /// Solved sketch coordinates written back by the rebuild engine.
    SolverWriteback,
    /// A replicated update from a peer.
    Remote,
    /// A remote update merged while a rebuild is running.
    RemoteInFlight,
    /// Any other caller-supplied tag.
    Tag(String),
}

impl Origin {
    pub fn as_str(&self) -> &str {
        match self {
            Origin::Local => "local",
            Origin::SolverWriteback => "solver-writeback",
            Origin::Remote => "remote",
            Origin::RemoteInFlight => "remote-in-flight",
            Origin::Tag(s) => s,
        }
    }

    /// Whether a change under this origin should reset the rebuild debounce.
    pub fn triggers_rebuild(&self) -> bool {
        !matches!(self, Origin::SolverWriteback | Origin::RemoteInFlight)
    }
}

/// One key-level change observed by a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocChange {
    MetaChanged,
    GateChanged,
    OrderChanged,
    FeatureUpserted(Uuid),
    FeatureRemoved(Uuid),
}

/// All changes from one committed transaction. Derived by a key-level diff,
/// so the order is deterministic: meta, gate, feature upserts in id order,
/// removals, then the timeline order.
pub type ChangeSet = Vec<DocChange>;

/// Errors from document mutations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DocError {
    #[error("feature not found: {id}")]
    FeatureNotFound { id: Uuid },

    #[error("feature {id} cannot be deleted: {reason}")]
    DeleteRejected { id: Uuid, reason: String },

    #[error("sketch not found: {id}")]
    SketchNotFound { id: Uuid },

    #[error("not a sketch feature: {id}")]
    NotASketch { id: Uuid },

    #[error("invalid sketch entity: {reason}")]
    InvalidSketchEntity { reason: String },

    #[error("transaction rejected: {reason}")]
    Rejected { reason: String },
}

type Subscriber = Box<dyn FnMut(&Document, &ChangeSet, &Origin)>;

/// The replicated, transactional document store.
///
/// Exclusively owns the mutable snapshot. All writes flow through
/// [`DocStore::transact`]; observers only ever see committed snapshots.
/// Each committed local transaction also appends a replication update to the
/// outbox (see [`crate::sync`]).
pub struct DocStore {
    doc: Document,
    /// Replication site identity for LWW tie-breaks.
    site: Uuid,
    /// Lamport clock, advanced on every commit and on remote receipt.
    clock: u64,
    /// Last-writer-wins stamp per replicated register.
    stamps: BTreeMap<RegKey, Stamp>,
    subscribers: Vec<Subscriber>,
    outbox: Vec<Update>,
}

impl DocStore {
    /// Wrap an existing snapshot (e.g. one loaded from disk).
    pub fn from_document(doc: Document) -> Self {
        Self {
            doc,
            site: Uuid::new_v4(),
            clock: 0,
            stamps: BTreeMap::new(),
            subscribers: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> &Document {
        &self.doc
    }

    pub fn site(&self) -> Uuid {
        self.site
    }

    /// Register a deep-change observer. Handlers receive the committed
    /// snapshot, the change set, and the transaction's origin tag.
    pub fn subscribe(&mut self, handler: impl FnMut(&Document, &ChangeSet, &Origin) + 'static) {
        self.subscribers.push(Box::new(handler));
    }

    /// Run a batched mutation atomically.
    ///
    /// The closure operates on a working copy; nothing is observable until it
    /// returns `Ok`. On `Err` the document is untouched. Committed changes are
    /// diffed per replicated register, stamped, pushed to the outbox (unless
    /// the origin is remote), and published to subscribers in one step.
    pub fn transact<R>(
        &mut self,
        origin: Origin,
        f: impl FnOnce(&mut Document) -> Result<R, DocError>,
    ) -> Result<R, DocError> {
        let mut working = self.doc.clone();
        let result = f(&mut working)?;

        let changes = diff_documents(&self.doc, &working);
        if changes.is_empty() {
            return Ok(result);
        }

        self.clock += 1;
        let stamp = Stamp {
            clock: self.clock,
            site: self.site,
        };

        let ops = register_ops_for(&working, &changes, stamp);
        for op in &ops {
            self.stamps.insert(op.key.clone(), op.stamp);
        }

        let is_remote = matches!(origin, Origin::Remote | Origin::RemoteInFlight);
        if !is_remote && !ops.is_empty() {
            self.outbox.push(Update { ops });
        }

        self.doc = working;
        debug!(origin = origin.as_str(), changes = changes.len(), "commit");

        #[cfg(debug_assertions)]
        if !is_remote {
            let violations = crate::validate::validate_invariants(&self.doc);
            debug_assert!(
                violations.is_empty(),
                "transaction broke document invariants: {violations:?}"
            );
        }

        self.notify(&changes, &origin);
        Ok(result)
    }

    /// Drain replication updates produced by local commits.
    pub fn take_updates(&mut self) -> Vec<Update> {
        std::mem::take(&mut self.outbox)
    }

    /// Full-state update for initial sync of a fresh peer.
    pub fn state_update(&self) -> Update {
        let mut ops = Vec::new();
        let stamp_for = |key: &RegKey, stamps: &BTreeMap<RegKey, Stamp>| {
            stamps.get(key).copied().unwrap_or(Stamp {
                clock: 0,
                site: self.site,
            })
        };

        ops.push(RegisterOp {
            key: RegKey::Meta,
            stamp: stamp_for(&RegKey::Meta, &self.stamps),
            value: RegValue::Meta(self.doc.meta.clone()),
        });
        ops.push(RegisterOp {
            key: RegKey::Gate,
            stamp: stamp_for(&RegKey::Gate, &self.stamps),
            value: RegValue::Gate(self.doc.state.rebuild_gate),
        });
        ops.push(RegisterOp {
            key: RegKey::Order,
            stamp: stamp_for(&RegKey::Order, &self.stamps),
            value: RegValue::Order(self.doc.feature_order.clone()),
        });
        for (id, feature) in &self.doc.features_by_id {
            let key = RegKey::Feature(*id);
            ops.push(RegisterOp {
                key: key.clone(),
                stamp: stamp_for(&key, &self.stamps),
                value: RegValue::Feature(Some(Box::new(feature.clone()))),
            });
        }
        Update { ops }
    }

    /// Merge a peer update. All-or-nothing: a payload that fails to decode or
    /// apply leaves the local document untouched.
    pub fn apply_update(&mut self, update: Update, origin: Origin) -> ChangeSet {
        let mut working = self.doc.clone();
        let mut changes: ChangeSet = Vec::new();
        let mut max_clock = self.clock;

        for op in &update.ops {
            max_clock = max_clock.max(op.stamp.clock);
            let current = self.stamps.get(&op.key);
            if let Some(cur) = current {
                if op.stamp <= *cur {
                    continue; // local register is newer (or identical)
                }
            }

            match &op.value {
                RegValue::Meta(meta) => {
                    working.meta = meta.clone();
                    changes.push(DocChange::MetaChanged);
                }
                RegValue::Gate(gate) => {
                    working.state.rebuild_gate = *gate;
                    changes.push(DocChange::GateChanged);
                }
                RegValue::Order(order) => {
                    working.feature_order = order.clone();
                    changes.push(DocChange::OrderChanged);
                }
                RegValue::Feature(Some(feature)) => {
                    let id = match &op.key {
                        RegKey::Feature(id) => *id,
                        _ => continue,
                    };
                    working.features_by_id.insert(id, (**feature).clone());
                    changes.push(DocChange::FeatureUpserted(id));
                }
                RegValue::Feature(None) => {
                    let id = match &op.key {
                        RegKey::Feature(id) => *id,
                        _ => continue,
                    };
                    working.features_by_id.remove(&id);
                    changes.push(DocChange::FeatureRemoved(id));
                }
            }
            self.stamps.insert(op.key.clone(), op.stamp);
        }

        if changes.is_empty() {
            return changes;
        }

        reconcile_order(&mut working);
        self.clock = max_clock;
        self.doc = working;
        self.notify(&changes, &origin);
        changes
    }

    fn notify(&mut self, changes: &ChangeSet, origin: &Origin) {
        let mut subs = std::mem::take(&mut self.subscribers);
        for handler in subs.iter_mut() {
            handler(&self.doc, changes, origin);
        }
        subs.extend(self.subscribers.drain(..));
        self.subscribers = subs;
    }
}

/// Key-level diff of two snapshots, used to derive register ops.
fn diff_documents(before: &Document, after: &Document) -> ChangeSet {
    let mut changes = Vec::new();
    if before.meta != after.meta {
        changes.push(DocChange::MetaChanged);
    }
    if before.state.rebuild_gate != after.state.rebuild_gate {
        changes.push(DocChange::GateChanged);
    }
    for (id, feature) in &after.features_by_id {
        match before.features_by_id.get(id) {
            Some(old) if old == feature => {}
            _ => changes.push(DocChange::FeatureUpserted(*id)),
        }
    }
    for id in before.features_by_id.keys() {
        if !after.features_by_id.contains_key(id) {
            changes.push(DocChange::FeatureRemoved(*id));
        }
    }
    if before.feature_order != after.feature_order {
        changes.push(DocChange::OrderChanged);
    }
    changes
}

fn register_ops_for(doc: &Document, changes: &ChangeSet, stamp: Stamp) -> Vec<RegisterOp> {
    let mut ops = Vec::new();
    for change in changes {
        let op = match change {
            DocChange::MetaChanged => RegisterOp {
                key: RegKey::Meta,
                stamp,
                value: RegValue::Meta(doc.meta.clone()),
            },
            DocChange::GateChanged => RegisterOp {
                key: RegKey::Gate,
                stamp,
                value: RegValue::Gate(doc.state.rebuild_gate),
            },
            DocChange::OrderChanged => RegisterOp {
                key: RegKey::Order,
                stamp,
                value: RegValue::Order(doc.feature_order.clone()),
            },
            DocChange::FeatureUpserted(id) => RegisterOp {
                key: RegKey::Feature(*id),
                stamp,
                value: RegValue::Feature(
                    doc.features_by_id.get(id).cloned().map(Box::new),
                ),
            },
            DocChange::FeatureRemoved(id) => RegisterOp {
                key: RegKey::Feature(*id),
                stamp,
                value: RegValue::Feature(None),
            },
        };
        ops.push(op);
    }
    ops
}

/// Restore the order/map permutation invariant after an LWW merge.
///
/// The order register and the per-feature registers can land from different
/// peers; entries whose feature was tombstoned are dropped and features
/// missing from the order are appended in id order. Deterministic, so every
/// peer converges to the same repair.
fn reconcile_order(doc: &mut Document) {
    doc.feature_order.retain(|id| doc.features_by_id.contains_key(id));
    let mut seen = std::collections::BTreeSet::new();
    doc.feature_order.retain(|id| seen.insert(*id));
    for id in doc.features_by_id.keys() {
        if !seen.contains(id) {
            doc.feature_order.push(*id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutate;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn transact_is_atomic_on_error() {
        let mut store = mutate::new_document("t");
        let before = store.snapshot().clone();
        let result: Result<(), DocError> = store.transact(Origin::Local, |doc| {
            doc.feature_order.clear(); // would be observable if committed
            Err(DocError::Rejected {
                reason: "nope".to_string(),
            })
        });
        assert!(result.is_err());
        assert_eq!(store.snapshot(), &before);
    }

    #[test]
    fn subscribers_see_origin_tag() {
        let mut store = mutate::new_document("t");
        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |_, _, origin| sink.borrow_mut().push(origin.as_str().to_string()));

        let id = store.snapshot().feature_order[0];
        store
            .transact(Origin::SolverWriteback, |doc| {
                let f = doc.features_by_id.get_mut(&id).unwrap();
                f.name = Some("renamed".to_string());
                Ok(())
            })
            .unwrap();

        assert_eq!(seen.borrow().as_slice(), ["solver-writeback"]);
    }

    #[test]
    fn noop_transaction_does_not_notify() {
        let mut store = mutate::new_document("t");
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        store.subscribe(move |_, _, _| *sink.borrow_mut() += 1);
        store.transact(Origin::Local, |_| Ok(())).unwrap();
        assert_eq!(*count.borrow(), 0);
        assert!(store.take_updates().is_empty());
    }

    #[test]
    fn solver_writeback_origin_does_not_trigger_rebuild() {
        assert!(!Origin::SolverWriteback.triggers_rebuild());
        assert!(!Origin::RemoteInFlight.triggers_rebuild());
        assert!(Origin::Local.triggers_rebuild());
        assert!(Origin::Remote.triggers_rebuild());
    }

    #[test]
    fn concurrent_edits_converge() {
        let mut a = mutate::new_document("shared");
        let _ = a.take_updates();

        // Bring up a second peer via full-state sync so stamps are shared.
        let mut b = DocStore::from_document(camber_types::Document::empty("peer"));
        b.apply_update(a.state_update(), Origin::Remote);
        assert_eq!(a.snapshot(), b.snapshot());

        let gate_target = a.snapshot().feature_order[1];
        a.transact(Origin::Local, |doc| {
            doc.state.rebuild_gate = Some(gate_target);
            Ok(())
        })
        .unwrap();
        let origin_id = b.snapshot().feature_order[0];
        b.transact(Origin::Local, |doc| {
            let f = doc.features_by_id.get_mut(&origin_id).unwrap();
            f.name = Some("Origin*".to_string());
            Ok(())
        })
        .unwrap();

        let from_a = a.take_updates();
        let from_b = b.take_updates();

        for u in &from_b {
            a.apply_update(u.clone(), Origin::Remote);
        }
        for u in &from_a {
            b.apply_update(u.clone(), Origin::Remote);
        }

        assert_eq!(a.snapshot(), b.snapshot());
        assert_eq!(a.snapshot().state.rebuild_gate, Some(gate_target));
        assert_eq!(
            a.snapshot().features_by_id[&origin_id].name.as_deref(),
            Some("Origin*")
        );
    }
}
