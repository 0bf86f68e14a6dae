//! Schema loader for one client session
//!
//! A load cycle runs in the background and fills the schema maps in three
//! ordered stages: the sorted type list, the type-name map, then the id maps.
//! Accessors await the stage they need through a `watch` channel, so any
//! number of tasks can ask for schema data before it has arrived.
//!
//! `shutdown()` cancels the in-flight cycle through its `CancellationToken`
//! and releases every waiter with empty data. `reload()` starts a fresh cycle
//! under the next generation number.

use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::event::{DataEvent, EventBus};
use crate::listing::cmp_ignore_case;
use crate::session::{remote_call, DirectorySession};
use dashmap::DashMap;
use dircache_types::{FieldDescriptor, ObjectId, TypeDescriptor, TypeId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Name returned for types that cannot be resolved
pub const UNKNOWN_TYPE_NAME: &str = "<unknown>";

/// Stages of a load cycle, in fetch order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadStage {
    Pending,
    TypeList,
    TypeNames,
    TypeMaps,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadStage::Pending => "pending",
            LoadStage::TypeList => "type list",
            LoadStage::TypeNames => "type names",
            LoadStage::TypeMaps => "type maps",
        };
        f.write_str(name)
    }
}

/// Observable state of a load cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleState {
    /// Running, with the last completed stage
    Running(LoadStage),
    /// Shut down; maps are empty
    Cancelled,
    /// A remote call failed before `stage` completed
    Failed { stage: LoadStage, message: String },
}

impl CycleState {
    /// Whether a waiter for `wanted` may proceed
    fn releases(&self, wanted: LoadStage) -> bool {
        match self {
            CycleState::Running(done) => *done >= wanted,
            CycleState::Cancelled | CycleState::Failed { .. } => true,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, CycleState::Running(LoadStage::TypeMaps))
    }
}

/// Field templates of one type, with a name index
#[derive(Debug, Clone)]
pub struct FieldTemplates {
    type_id: TypeId,
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
}

impl FieldTemplates {
    pub fn new(type_id: TypeId, fields: Vec<FieldDescriptor>) -> Self {
        let by_name = fields
            .iter()
            .enumerate()
            .map(|(index, field)| (field.name.clone(), index))
            .collect();

        Self {
            type_id,
            fields,
            by_name,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fields in server order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&index| &self.fields[index])
    }

    pub fn by_id(&self, field_id: i16) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.id == field_id)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Default)]
struct SchemaMaps {
    types: Arc<Vec<TypeDescriptor>>,
    names: Arc<HashMap<TypeId, String>>,
    by_id: Arc<HashMap<TypeId, TypeDescriptor>>,
    to_id: Arc<HashMap<TypeDescriptor, TypeId>>,
    name_to_id: Arc<HashMap<String, TypeId>>,
}

type TemplateCell = Arc<OnceCell<Arc<FieldTemplates>>>;

/// One run of the fetch sequence and everything it produced
struct LoadCycle {
    generation: u64,
    token: CancellationToken,
    state: watch::Sender<CycleState>,
    maps: RwLock<SchemaMaps>,
    templates: DashMap<TypeId, TemplateCell>,
}

impl LoadCycle {
    fn new(generation: u64) -> Arc<Self> {
        let (state, _) = watch::channel(CycleState::Running(LoadStage::Pending));
        Arc::new(Self {
            generation,
            token: CancellationToken::new(),
            state,
            maps: RwLock::new(SchemaMaps::default()),
            templates: DashMap::new(),
        })
    }

    /// Store a stage's maps and advance the state
    ///
    /// Returns false, leaving the maps untouched, once the cycle is cancelled.
    fn complete_stage(&self, stage: LoadStage, update: impl FnOnce(&mut SchemaMaps)) -> bool {
        let mut maps = self.maps.write();
        if self.token.is_cancelled() {
            return false;
        }
        update(&mut maps);

        // Still under the maps lock: a waiter woken here sees the new maps.
        self.state.send_if_modified(|state| {
            if matches!(state, CycleState::Running(done) if *done < stage) {
                *state = CycleState::Running(stage);
                true
            } else {
                false
            }
        })
    }

    fn fail(&self, stage: LoadStage, message: String) -> bool {
        self.state.send_if_modified(|state| {
            if matches!(state, CycleState::Running(_)) {
                *state = CycleState::Failed { stage, message };
                true
            } else {
                false
            }
        })
    }

    fn cancel(&self) {
        self.token.cancel();
        *self.maps.write() = SchemaMaps::default();
        self.templates.clear();
        self.state.send_replace(CycleState::Cancelled);
    }
}

/// Background schema loader for one session
pub struct Loader {
    session: Arc<dyn DirectorySession>,
    remote_timeout: Duration,
    event_bus: EventBus,
    cycle: RwLock<Arc<LoadCycle>>,
    next_generation: AtomicU64,
}

impl Loader {
    /// Create the loader and spawn its first load cycle
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        session: Arc<dyn DirectorySession>,
        config: &ClientConfig,
        event_bus: EventBus,
    ) -> Self {
        let first = LoadCycle::new(1);
        let loader = Self {
            session,
            remote_timeout: config.remote_timeout,
            event_bus,
            cycle: RwLock::new(Arc::clone(&first)),
            next_generation: AtomicU64::new(2),
        };
        loader.spawn_cycle(first);
        loader
    }

    fn spawn_cycle(&self, cycle: Arc<LoadCycle>) {
        let session = Arc::clone(&self.session);
        let event_bus = self.event_bus.clone();
        let timeout = self.remote_timeout;
        tokio::spawn(run_cycle(session, cycle, timeout, event_bus));
    }

    fn current_cycle(&self) -> Arc<LoadCycle> {
        Arc::clone(&self.cycle.read())
    }

    /// Generation number of the current load cycle (starts at 1)
    pub fn generation(&self) -> u64 {
        self.current_cycle().generation
    }

    /// Snapshot of the current cycle's state
    pub fn state(&self) -> CycleState {
        self.current_cycle().state.borrow().clone()
    }

    /// True once every schema map of the current cycle is populated
    pub fn is_loaded(&self) -> bool {
        self.state().is_complete()
    }

    /// Cancel the current cycle and release every waiter
    ///
    /// Pending and future accessor calls return empty maps until `reload()`.
    pub fn shutdown(&self) {
        let cycle = self.current_cycle();
        cycle.cancel();
        info!(generation = cycle.generation, "Loader shut down");
    }

    /// Shut down the current cycle and start a fresh one
    pub fn reload(&self) {
        let fresh = LoadCycle::new(self.next_generation.fetch_add(1, Ordering::Relaxed));
        let previous = std::mem::replace(&mut *self.cycle.write(), Arc::clone(&fresh));
        previous.cancel();
        debug!(
            previous = previous.generation,
            generation = fresh.generation,
            "Reloading schema"
        );
        self.spawn_cycle(fresh);
    }

    async fn wait_for_stage(&self, stage: LoadStage) -> Result<Arc<LoadCycle>, CoreError> {
        let cycle = self.current_cycle();
        let mut rx = cycle.state.subscribe();

        let state = rx
            .wait_for(|state| state.releases(stage))
            .await
            .map_err(|_| CoreError::LoaderShutdown)?
            .clone();

        match state {
            CycleState::Failed { stage, message } => Err(CoreError::LoadFailed {
                generation: cycle.generation,
                stage,
                message,
            }),
            _ => Ok(cycle),
        }
    }

    // ===================
    // Schema accessors
    // ===================

    /// Type descriptors sorted by name
    pub async fn type_list(&self) -> Result<Arc<Vec<TypeDescriptor>>, CoreError> {
        let cycle = self.wait_for_stage(LoadStage::TypeList).await?;
        let types = Arc::clone(&cycle.maps.read().types);
        Ok(types)
    }

    /// Type id to display name
    pub async fn type_name_map(&self) -> Result<Arc<HashMap<TypeId, String>>, CoreError> {
        let cycle = self.wait_for_stage(LoadStage::TypeNames).await?;
        let names = Arc::clone(&cycle.maps.read().names);
        Ok(names)
    }

    /// Type id to descriptor
    pub async fn type_map(&self) -> Result<Arc<HashMap<TypeId, TypeDescriptor>>, CoreError> {
        let cycle = self.wait_for_stage(LoadStage::TypeMaps).await?;
        let by_id = Arc::clone(&cycle.maps.read().by_id);
        Ok(by_id)
    }

    /// Descriptor to type id
    pub async fn type_to_id_map(&self) -> Result<Arc<HashMap<TypeDescriptor, TypeId>>, CoreError> {
        let cycle = self.wait_for_stage(LoadStage::TypeMaps).await?;
        let to_id = Arc::clone(&cycle.maps.read().to_id);
        Ok(to_id)
    }

    /// Type name to type id
    pub async fn name_to_id_map(&self) -> Result<Arc<HashMap<String, TypeId>>, CoreError> {
        let cycle = self.wait_for_stage(LoadStage::TypeMaps).await?;
        let name_to_id = Arc::clone(&cycle.maps.read().name_to_id);
        Ok(name_to_id)
    }

    pub async fn type_descriptor(&self, type_id: TypeId) -> Result<Option<TypeDescriptor>, CoreError> {
        Ok(self.type_map().await?.get(&type_id).cloned())
    }

    pub async fn type_id_for_name(&self, name: &str) -> Result<Option<TypeId>, CoreError> {
        Ok(self.name_to_id_map().await?.get(name).copied())
    }

    /// Resolve a type's name, distinguishing every failure
    ///
    /// Returns `LoaderShutdown` when the cycle was cancelled, `LoadFailed`
    /// when it stopped on a remote error, and `UnknownType` when the schema
    /// loaded but has no such type.
    pub async fn try_type_name(&self, type_id: TypeId) -> Result<String, CoreError> {
        let cycle = self.wait_for_stage(LoadStage::TypeMaps).await?;
        if cycle.token.is_cancelled() {
            return Err(CoreError::LoaderShutdown);
        }

        let maps = cycle.maps.read();
        maps.by_id
            .get(&type_id)
            .map(|descriptor| descriptor.name.clone())
            .ok_or(CoreError::UnknownType { type_id })
    }

    /// Resolve a type's name, or [`UNKNOWN_TYPE_NAME`]
    pub async fn type_name(&self, type_id: TypeId) -> String {
        match self.try_type_name(type_id).await {
            Ok(name) => name,
            Err(e) => {
                debug!(type_id = %type_id, error = %e, "Type name unresolved");
                UNKNOWN_TYPE_NAME.to_string()
            }
        }
    }

    /// Name of the type an object belongs to, or [`UNKNOWN_TYPE_NAME`]
    pub async fn object_type_name(&self, object_id: ObjectId) -> String {
        self.type_name(object_id.type_id()).await
    }

    // ===================
    // Field templates
    // ===================

    /// Field templates for a type, fetched once per load cycle
    ///
    /// Concurrent first calls for the same type share one remote fetch.
    pub async fn field_templates(&self, type_id: TypeId) -> Result<Arc<FieldTemplates>, CoreError> {
        let cycle = self.current_cycle();
        if cycle.token.is_cancelled() {
            return Err(CoreError::LoaderShutdown);
        }

        let cell = Arc::clone(cycle.templates.entry(type_id).or_default().value());
        let session = &self.session;
        let timeout = self.remote_timeout;
        let token = cycle.token.clone();

        let templates = cell
            .get_or_try_init(|| async move {
                debug!(type_id = %type_id, "Fetching field templates");
                let fields = tokio::select! {
                    _ = token.cancelled() => return Err(CoreError::LoaderShutdown),
                    result = remote_call("field_templates", timeout, session.field_templates(type_id)) => result?,
                };
                debug!(type_id = %type_id, count = fields.len(), "Field templates cached");
                Ok::<_, CoreError>(Arc::new(FieldTemplates::new(type_id, fields)))
            })
            .await?;

        Ok(Arc::clone(templates))
    }

    /// One field template looked up by name
    pub async fn field_template(
        &self,
        type_id: TypeId,
        name: &str,
    ) -> Result<Option<FieldDescriptor>, CoreError> {
        let templates = self.field_templates(type_id).await?;
        Ok(templates.get(name).cloned())
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        self.cycle.read().token.cancel();
    }
}

/// The fetch sequence: type list, then names, then id maps
async fn run_cycle(
    session: Arc<dyn DirectorySession>,
    cycle: Arc<LoadCycle>,
    timeout: Duration,
    event_bus: EventBus,
) {
    let generation = cycle.generation;
    info!(generation, "Starting schema load cycle");

    let fetched = tokio::select! {
        _ = cycle.token.cancelled() => {
            debug!(generation, "Load cycle cancelled before the type list arrived");
            return;
        }
        result = remote_call("type_list", timeout, session.type_list()) => result,
    };

    let mut types = match fetched {
        Ok(types) => types,
        Err(e) => {
            error!(generation, error = %e, "Could not load the type list");
            if cycle.fail(LoadStage::TypeList, e.to_string()) {
                event_bus.publish(DataEvent::SchemaLoadFailed {
                    generation,
                    message: e.to_string(),
                });
            }
            return;
        }
    };

    types.sort_by(|a, b| cmp_ignore_case(&a.name, &b.name));
    let types = Arc::new(types);

    if !cycle.complete_stage(LoadStage::TypeList, |maps| maps.types = Arc::clone(&types)) {
        return;
    }
    debug!(generation, count = types.len(), "Type list loaded");

    let names: HashMap<TypeId, String> = types
        .iter()
        .map(|descriptor| (descriptor.id, descriptor.name.clone()))
        .collect();

    if !cycle.complete_stage(LoadStage::TypeNames, |maps| maps.names = Arc::new(names)) {
        return;
    }

    let mut by_id = HashMap::with_capacity(types.len());
    let mut to_id = HashMap::with_capacity(types.len());
    let mut name_to_id = HashMap::with_capacity(types.len());
    for descriptor in types.iter() {
        by_id.insert(descriptor.id, descriptor.clone());
        to_id.insert(descriptor.clone(), descriptor.id);
        name_to_id.insert(descriptor.name.clone(), descriptor.id);
    }

    let completed = cycle.complete_stage(LoadStage::TypeMaps, |maps| {
        maps.by_id = Arc::new(by_id);
        maps.to_id = Arc::new(to_id);
        maps.name_to_id = Arc::new(name_to_id);
    });

    if completed {
        info!(generation, type_count = types.len(), "Schema load cycle complete");
        event_bus.publish(DataEvent::SchemaLoaded {
            generation,
            type_count: types.len(),
        });
    }
}
