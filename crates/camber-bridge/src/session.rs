//! The rebuild worker session: the document store copy, the debounced
//! scheduler, and the message dispatch the host pumps from its event loop.
//!
//! The replication channel is the only mutating entry point; the engine only
//! ever sees committed snapshots. Each rebuild runs on a fresh kernel
//! session, and the previous session's handles are gone before the next
//! starts.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use camber_doc::{mutate, save_document, DocStore, Origin, Update};
use camber_engine::{preview_extrude, preview_revolve, rebuild, RebuildResult, RebuildScheduler};
use camber_kernel::{AnalyticKernel, Mesh};
use camber_types::Document;
use tracing::warn;
use uuid::Uuid;

use crate::messages::{WorkerRequest, WorkerResponse};
use crate::stl;

pub struct WorkerSession {
    store: DocStore,
    scheduler: RebuildScheduler,
    last_result: Option<RebuildResult>,
    preview: Option<Mesh>,
    /// Origins of transactions committed since the last pump, fed by the
    /// store subscription.
    pending: Rc<RefCell<Vec<Origin>>>,
}

impl WorkerSession {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_store(mutate::new_document(name))
    }

    pub fn from_document(doc: Document) -> Self {
        Self::with_store(DocStore::from_document(doc))
    }

    fn with_store(mut store: DocStore) -> Self {
        let pending: Rc<RefCell<Vec<Origin>>> = Rc::new(RefCell::new(Vec::new()));
        {
            let pending = pending.clone();
            store.subscribe(move |_, _, origin| pending.borrow_mut().push(origin.clone()));
        }
        let mut scheduler = RebuildScheduler::new();
        // The seeded document wants an initial rebuild.
        scheduler.note_change(&Origin::Local, Instant::now());
        Self {
            store,
            scheduler,
            last_result: None,
            preview: None,
            pending,
        }
    }

    pub fn store(&mut self) -> &mut DocStore {
        &mut self.store
    }

    pub fn snapshot(&self) -> &Document {
        self.store.snapshot()
    }

    pub fn last_result(&self) -> Option<&RebuildResult> {
        self.last_result.as_ref()
    }

    /// Handle one inbound message. Replication payloads only mutate the
    /// store; the rebuild itself happens on the next due pump.
    pub fn handle(&mut self, request: WorkerRequest, now: Instant) -> Vec<WorkerResponse> {
        match request {
            WorkerRequest::InitSync => vec![
                WorkerResponse::Ready,
                WorkerResponse::SyncUpdate {
                    bytes: self.store.state_update().encode(),
                },
            ],

            WorkerRequest::SyncInit { bytes } | WorkerRequest::SyncUpdate { bytes } => {
                match Update::decode(&bytes) {
                    Ok(update) => {
                        self.store.apply_update(update, Origin::Remote);
                        Vec::new()
                    }
                    Err(e) => vec![WorkerResponse::Error {
                        message: e.to_string(),
                    }],
                }
            }

            WorkerRequest::PreviewExtrude {
                sketch_id,
                distance,
                direction,
                op,
            } => match preview_extrude(self.store.snapshot(), sketch_id, distance, direction, op) {
                Ok(mesh) => {
                    self.preview = Some(mesh.clone());
                    vec![WorkerResponse::PreviewMesh { mesh }]
                }
                Err(e) => vec![WorkerResponse::PreviewError {
                    message: e.to_string(),
                }],
            },

            WorkerRequest::PreviewRevolve {
                sketch_id,
                axis,
                angle,
                op,
            } => match preview_revolve(self.store.snapshot(), sketch_id, axis, angle, op) {
                Ok(mesh) => {
                    self.preview = Some(mesh.clone());
                    vec![WorkerResponse::PreviewMesh { mesh }]
                }
                Err(e) => vec![WorkerResponse::PreviewError {
                    message: e.to_string(),
                }],
            },

            WorkerRequest::ClearPreview => {
                self.preview = None;
                Vec::new()
            }

            WorkerRequest::ExportStl { binary, name } => {
                self.ensure_result(now);
                let name = name.unwrap_or_else(|| "camber".to_string());
                let result = self.last_result.as_ref().expect("ensured above");
                let meshes: Vec<&Mesh> = result
                    .bodies
                    .iter()
                    .filter_map(|b| result.meshes.get(&b.key))
                    .collect();
                if binary.unwrap_or(true) {
                    let buffer = stl::meshes_to_stl_binary(&meshes, &name);
                    vec![WorkerResponse::StlExported {
                        buffer: Some(STANDARD.encode(buffer)),
                        content: None,
                    }]
                } else {
                    vec![WorkerResponse::StlExported {
                        buffer: None,
                        content: Some(stl::meshes_to_stl_ascii(&meshes, &name)),
                    }]
                }
            }

            WorkerRequest::ExportStep { name } => {
                let name = name.unwrap_or_else(|| "camber".to_string());
                match camber_engine::export_step(self.store.snapshot(), &name) {
                    Ok(step) => vec![WorkerResponse::StepExported { buffer: step }],
                    Err(e) => vec![WorkerResponse::Error {
                        message: e.to_string(),
                    }],
                }
            }

            WorkerRequest::ExportJson => vec![WorkerResponse::JsonExported {
                content: save_document(self.store.snapshot()),
            }],
        }
    }

    /// Drive the scheduler: fold pending change origins into the debounce,
    /// flush outbound replication updates, and run a rebuild when due.
    pub fn pump(&mut self, now: Instant) -> Vec<WorkerResponse> {
        let mut out = Vec::new();
        self.absorb_pending(now);
        self.flush_updates(&mut out);

        if self.scheduler.take_due(now) {
            out.push(WorkerResponse::RebuildStart);
            let result = self.rebuild_once();

            for solve in &result.sketch_solve_results {
                out.push(WorkerResponse::SketchSolved {
                    sketch_id: solve.sketch_id,
                    points: solve.changed_points.clone(),
                    status: solve.status,
                    plane_transform: solve.plane_transform,
                    dof: Some(solve.dof),
                });
            }

            out.push(WorkerResponse::RebuildComplete {
                bodies: result.bodies.clone(),
                feature_status: result.feature_status.clone(),
                errors: result.errors.clone(),
                reference_index: Some(result.reference_index.clone()),
            });
            for body in &result.bodies {
                if let Some(mesh) = result.meshes.get(&body.key) {
                    out.push(WorkerResponse::Mesh {
                        body_id: body.key,
                        mesh: mesh.clone(),
                        color: Some(body.color.clone()),
                    });
                }
            }

            self.last_result = Some(result);
            // Write-backs landed under the solver origin; absorbing them now
            // must not re-arm the scheduler.
            self.absorb_pending(now);
            self.flush_updates(&mut out);
        }
        out
    }

    fn absorb_pending(&mut self, now: Instant) {
        for origin in self.pending.borrow_mut().drain(..) {
            self.scheduler.note_change(&origin, now);
        }
    }

    /// Every committed local mutation (including solver write-backs) emits a
    /// replication update for the peers.
    fn flush_updates(&mut self, out: &mut Vec<WorkerResponse>) {
        for update in self.store.take_updates() {
            out.push(WorkerResponse::SyncUpdate {
                bytes: update.encode(),
            });
        }
    }

    fn rebuild_once(&mut self) -> RebuildResult {
        let mut kernel = AnalyticKernel::new();
        let result = rebuild(self.store.snapshot(), &mut kernel);
        for solve in &result.sketch_solve_results {
            if let Err(e) = camber_sketch::write_back(&mut self.store, solve) {
                warn!(sketch = %solve.sketch_id, error = %e, "solver write-back failed");
            }
        }
        result
    }

    fn ensure_result(&mut self, _now: Instant) {
        if self.last_result.is_none() {
            let result = self.rebuild_once();
            self.last_result = Some(result);
        }
    }

    /// Body key of the last rebuild's only body, for tests and exports.
    pub fn single_body_key(&self) -> Option<Uuid> {
        let result = self.last_result.as_ref()?;
        if result.bodies.len() == 1 {
            Some(result.bodies[0].key)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pump_until_rebuilt(session: &mut WorkerSession) -> Vec<WorkerResponse> {
        let later = Instant::now() + Duration::from_millis(100);
        session.pump(later)
    }

    #[test]
    fn init_sync_answers_ready_and_state() {
        let mut session = WorkerSession::new("doc");
        let responses = session.handle(WorkerRequest::InitSync, Instant::now());
        assert!(matches!(responses[0], WorkerResponse::Ready));
        assert!(matches!(responses[1], WorkerResponse::SyncUpdate { .. }));
    }

    #[test]
    fn seeded_session_rebuilds_on_first_due_pump() {
        let mut session = WorkerSession::new("doc");
        let responses = pump_until_rebuilt(&mut session);
        assert!(responses
            .iter()
            .any(|r| matches!(r, WorkerResponse::RebuildStart)));
        assert!(responses
            .iter()
            .any(|r| matches!(r, WorkerResponse::RebuildComplete { .. })));
        // Datums only: no bodies, no errors.
        match responses
            .iter()
            .find(|r| matches!(r, WorkerResponse::RebuildComplete { .. }))
        {
            Some(WorkerResponse::RebuildComplete { bodies, errors, .. }) => {
                assert!(bodies.is_empty());
                assert!(errors.is_empty());
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn malformed_update_is_rejected_without_corruption() {
        let mut session = WorkerSession::new("doc");
        let before = session.snapshot().clone();
        let responses = session.handle(
            WorkerRequest::SyncUpdate {
                bytes: b"garbage".to_vec(),
            },
            Instant::now(),
        );
        assert!(matches!(responses[0], WorkerResponse::Error { .. }));
        assert_eq!(session.snapshot(), &before);
    }

    #[test]
    fn export_json_round_trips() {
        let mut session = WorkerSession::new("doc");
        let responses = session.handle(WorkerRequest::ExportJson, Instant::now());
        match &responses[0] {
            WorkerResponse::JsonExported { content } => {
                let loaded = camber_doc::load_document(content).unwrap();
                assert_eq!(&loaded, session.snapshot());
            }
            other => panic!("expected json export, got {other:?}"),
        }
    }

    #[test]
    fn rebuild_is_not_retriggered_by_its_own_writeback() {
        let mut session = WorkerSession::new("doc");
        pump_until_rebuilt(&mut session);
        // Nothing new: a later pump stays quiet.
        let later = Instant::now() + Duration::from_secs(1);
        let responses = session.pump(later);
        assert!(
            !responses
                .iter()
                .any(|r| matches!(r, WorkerResponse::RebuildStart)),
            "write-back must not schedule another rebuild"
        );
    }
}
