mod instance;
mod signal;

use std::any::{self, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use snafu::prelude::*;

use crate::context::{ContextId, STATIC_CONTEXT};
use crate::scope::Scope;
use crate::token::Token;
use crate::util::any::AsAny;

pub use instance::{Acquisition, InstancePerContext, InstanceRef};
pub use signal::DoneSignal;

/// A type whose instances can be managed by an instance wrapper.
///
/// Every `Send + Sync + 'static` type qualifies through the blanket
/// implementation; the trait only exists so instances can be type-erased
/// behind [`Instance`] and recovered with
/// [`DowncastArc`](crate::DowncastArc).
pub trait Injectable: AsAny + Send + Sync + 'static {}

impl<T> Injectable for T where T: AsAny + Send + Sync + 'static {}

impl Debug for dyn Injectable {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.type_name())
    }
}

/// A type-erased, shareable instance value.
pub type Instance = Arc<dyn Injectable>;

/// An opaque reference to the module hosting a wrapper. The module registry
/// owns the module type; this crate only stores the reference.
pub type HostRef = Arc<dyn AsAny + Send + Sync>;

/// The concrete constructible type behind a wrapper.
///
/// Virtual registrations, e.g. value providers, have no metatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metatype {
    type_id: TypeId,
    type_name: &'static str,
}

impl Metatype {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl Display for Metatype {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.type_name)
    }
}

/// The identity of one wrapper, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WrapperId {
    id: u64,
}

impl WrapperId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn id(self) -> u64 {
        self.id
    }
}

/// A property-injection edge: the target field key and the wrapper supplying
/// its value.
#[derive(Debug, Clone)]
pub struct PropertyMetadata {
    pub key: String,
    pub wrapper: Arc<InstanceWrapper>,
}

/// Configuration for constructing an [`InstanceWrapper`].
///
/// All fields are optional except `name`; unspecified fields keep their
/// documented defaults, so registration sites only spell out what differs:
///
/// ```
/// use wirebox::prelude::*;
///
/// let wrapper = InstanceWrapper::new(WrapperSettings {
///     name: "HttpClient".into(),
///     metatype: Some(Metatype::of::<u8>()),
///     scope: Scope::Request,
///     ..WrapperSettings::default()
/// });
/// assert!(!wrapper.is_dependency_tree_static());
/// ```
pub struct WrapperSettings {
    /// Display name of the component, used in diagnostics.
    pub name: String,
    /// Concrete constructible type. Defaults to [`None`] for virtual
    /// registrations.
    pub metatype: Option<Metatype>,
    /// Declared injection tokens in constructor order. Defaults to [`None`];
    /// only factory-style registrations carry tokens.
    pub inject: Option<Vec<Box<dyn Token>>>,
    /// Sharing scope. Defaults to [`Scope::Default`].
    pub scope: Scope,
    /// The hosting module. Defaults to [`None`].
    pub host: Option<HostRef>,
    /// Whether the component was registered through a forward reference.
    /// Defaults to `false`.
    pub is_forward_ref: bool,
    /// Seed instance for the static context record. Defaults to [`None`].
    pub instance: Option<Instance>,
    /// Seed resolution flag for the static context record. Only honored
    /// together with `instance`. Defaults to `false`.
    pub is_resolved: bool,
}

impl Default for WrapperSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            metatype: None,
            inject: None,
            scope: Scope::Default,
            host: None,
            is_forward_ref: false,
            instance: None,
            is_resolved: false,
        }
    }
}

/// The registry node describing one injectable component.
///
/// A wrapper carries three things: the component's identity and declared
/// metadata, the graph edges to the wrappers it depends on, and the
/// per-context cache of materialized instances. Edges accrete incrementally
/// while the surrounding system discovers them and are never removed, so
/// the static/dynamic classification is recomputed on every query instead of
/// being cached.
///
/// The wrapper exclusively owns its context-to-record map. Callers receive
/// [`InstanceRef`] handles to individual records and must evict a context's
/// record through [`remove_instance_by_context_id`] when the owning context
/// ends; entries are never dropped implicitly.
///
/// [`remove_instance_by_context_id`]: InstanceWrapper::remove_instance_by_context_id
pub struct InstanceWrapper {
    id: WrapperId,
    name: String,
    metatype: Option<Metatype>,
    inject: Option<Vec<Box<dyn Token>>>,
    scope: Scope,
    host: Option<HostRef>,
    is_forward_ref: AtomicBool,
    values: Mutex<HashMap<ContextId, InstanceRef>>,
    metadata: Mutex<MetadataStore>,
}

impl InstanceWrapper {
    pub fn new(settings: WrapperSettings) -> Self {
        let WrapperSettings {
            name,
            metatype,
            inject,
            scope,
            host,
            is_forward_ref,
            instance,
            is_resolved,
        } = settings;

        let record = match instance {
            Some(instance) if is_resolved => InstancePerContext::resolved(instance),
            Some(instance) => {
                let mut record = InstancePerContext::new();
                record.set_instance(Some(instance));
                record
            }
            None => InstancePerContext::new(),
        };

        let mut values = HashMap::new();
        values.insert(STATIC_CONTEXT, InstanceRef::new(record));

        Self {
            id: WrapperId::next(),
            name,
            metatype,
            inject,
            scope,
            host,
            is_forward_ref: AtomicBool::new(is_forward_ref),
            values: Mutex::new(values),
            metadata: Mutex::new(MetadataStore::new()),
        }
    }

    pub fn id(&self) -> WrapperId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metatype(&self) -> Option<Metatype> {
        self.metatype
    }

    /// Returns true if the wrapper has no concrete constructible type, i.e.
    /// it is a virtual registration such as a value provider.
    pub fn is_metatype_absent(&self) -> bool {
        self.metatype.is_none()
    }

    pub fn inject(&self) -> Option<&[Box<dyn Token>]> {
        self.inject.as_deref()
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn host(&self) -> Option<HostRef> {
        self.host.clone()
    }

    pub fn is_forward_ref(&self) -> bool {
        self.is_forward_ref.load(Ordering::Relaxed)
    }

    pub fn set_forward_ref(&self, is_forward_ref: bool) {
        self.is_forward_ref.store(is_forward_ref, Ordering::Relaxed);
    }

    /// Writes `instance` into the static context's record, overwriting any
    /// prior value. Resolution flags are left for the caller to manage.
    pub fn set_instance(&self, instance: Instance) {
        self.get_instance_by_context_id(STATIC_CONTEXT)
            .set_instance(Some(instance));
    }

    /// Returns the static context's current instance, or [`None`] if it has
    /// never been resolved.
    pub fn instance(&self) -> Option<Instance> {
        self.get_instance_by_context_id(STATIC_CONTEXT).instance()
    }

    /// Records the positional constructor dependency at `index`. Indices may
    /// be sparse; the last write at a given index wins.
    pub fn add_ctor_metadata(&self, index: usize, wrapper: Arc<InstanceWrapper>) {
        let mut metadata = self.metadata.lock();
        if metadata.dependencies.len() <= index {
            metadata.dependencies.resize(index + 1, None);
        }
        metadata.dependencies[index] = Some(wrapper);
    }

    /// Returns the positional constructor dependencies registered so far.
    /// Unfilled positions are [`None`].
    pub fn ctor_metadata(&self) -> Vec<Option<Arc<InstanceWrapper>>> {
        self.metadata.lock().dependencies.clone()
    }

    /// Appends a property-injection edge. Duplicate keys are kept as
    /// append-only history.
    pub fn add_properties_metadata(&self, key: impl Into<String>, wrapper: Arc<InstanceWrapper>) {
        self.metadata.lock().properties.push(PropertyMetadata {
            key: key.into(),
            wrapper,
        });
    }

    pub fn properties_metadata(&self) -> Vec<PropertyMetadata> {
        self.metadata.lock().properties.clone()
    }

    /// Appends an edge to an enhancer wrapper attached to this component.
    pub fn add_enhancer_metadata(&self, wrapper: Arc<InstanceWrapper>) {
        self.metadata.lock().enhancers.push(wrapper);
    }

    pub fn enhancers_metadata(&self) -> Vec<Arc<InstanceWrapper>> {
        self.metadata.lock().enhancers.clone()
    }

    /// Decides whether this wrapper's whole reachable subtree is free of
    /// context-sensitive components, so its instances may be shared across
    /// every context.
    ///
    /// The verdict is recomputed on every call: edges accrete while the
    /// surrounding system registers components, and a cached verdict would
    /// go stale the moment a request-scoped dependency is added. A
    /// request-scoped wrapper is dynamic outright; otherwise the wrapper is
    /// static when all registered constructor dependencies, then all
    /// property targets, then all enhancers are static, with empty lists
    /// counting as vacuously static.
    ///
    /// Cyclic graphs terminate: a wrapper re-entered within one call is
    /// treated optimistically as static, which is sound because a truly
    /// dynamic node short-circuits the whole conjunction before any second
    /// visit can matter.
    pub fn is_dependency_tree_static(&self) -> bool {
        self.compute_static(&mut HashSet::new())
    }

    fn compute_static(&self, visiting: &mut HashSet<WrapperId>) -> bool {
        if self.scope.is_context_sensitive() {
            return false;
        }
        if !visiting.insert(self.id) {
            return true;
        }

        // Edges are cloned out of the lock so recursion never holds two
        // wrappers' metadata locks at once.
        let (dependencies, properties, enhancers) = {
            let metadata = self.metadata.lock();
            let dependencies: Vec<_> = metadata.dependencies.iter().flatten().cloned().collect();
            let properties: Vec<_> = metadata
                .properties
                .iter()
                .map(|property| Arc::clone(&property.wrapper))
                .collect();
            let enhancers = metadata.enhancers.clone();
            (dependencies, properties, enhancers)
        };

        Self::is_tree_static(&dependencies, visiting)
            && Self::is_tree_static(&properties, visiting)
            && Self::is_tree_static(&enhancers, visiting)
    }

    fn is_tree_static(tree: &[Arc<InstanceWrapper>], visiting: &mut HashSet<WrapperId>) -> bool {
        tree.iter().all(|wrapper| wrapper.compute_static(visiting))
    }

    /// Returns the record holding this wrapper's instance state for
    /// `context_id`.
    ///
    /// On a cache miss the classification decides the outcome: a static
    /// tree shares the static context's record itself, with no clone and no
    /// new entry, while a dynamic tree receives a fresh empty record stored
    /// under `context_id`. Two sequential calls without an intervening
    /// [`set_instance_by_context_id`] therefore return the same record.
    ///
    /// [`set_instance_by_context_id`]: InstanceWrapper::set_instance_by_context_id
    pub fn get_instance_by_context_id(&self, context_id: ContextId) -> InstanceRef {
        if let Some(record) = self.values.lock().get(&context_id) {
            return record.clone();
        }
        self.clone_static_instance(context_id)
    }

    /// Unconditionally inserts or overwrites the record for `context_id`.
    pub fn set_instance_by_context_id(&self, context_id: ContextId, record: InstanceRef) {
        self.values.lock().insert(context_id, record);
    }

    /// Evicts the record owned by `context_id` once that context ends.
    ///
    /// Eviction is an explicit contract: nothing reclaims records behind the
    /// caller's back. The static context's record is the canonical fallback
    /// and is never removed.
    pub fn remove_instance_by_context_id(&self, context_id: ContextId) -> Option<InstanceRef> {
        if context_id.is_static() {
            return None;
        }
        self.values.lock().remove(&context_id)
    }

    /// Returns the resolved instance for `context_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::NotResolved`] if no resolution has
    /// completed for that context yet.
    pub fn resolved_instance(&self, context_id: ContextId) -> Result<Instance, ResolutionError> {
        self.get_instance_by_context_id(context_id)
            .resolved_instance()
            .context(NotResolvedSnafu {
                name: self.name.clone(),
                context: context_id,
            })
    }

    fn clone_static_instance(&self, context_id: ContextId) -> InstanceRef {
        // Classified before taking the values lock; classification walks
        // other wrappers' metadata locks.
        let is_static = self.is_dependency_tree_static();

        let mut values = self.values.lock();
        if let Some(record) = values.get(&context_id) {
            return record.clone();
        }

        let Some(static_record) = values.get(&STATIC_CONTEXT).cloned() else {
            unreachable!("the static context record should be seeded on construction")
        };
        if is_static {
            return static_record;
        }

        let record = static_record.clone_for_context();
        values.insert(context_id, record.clone());
        record
    }
}

impl Debug for InstanceWrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("InstanceWrapper")
            .field("id", &self.id.id)
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

struct MetadataStore {
    dependencies: Vec<Option<Arc<InstanceWrapper>>>,
    properties: Vec<PropertyMetadata>,
    enhancers: Vec<Arc<InstanceWrapper>>,
}

impl MetadataStore {
    fn new() -> Self {
        Self {
            dependencies: Vec::new(),
            properties: Vec::new(),
            enhancers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Snafu)]
#[non_exhaustive]
pub enum ResolutionError {
    #[snafu(display("instance of `{name}` has not been resolved in {context}"))]
    #[non_exhaustive]
    NotResolved { name: String, context: ContextId },
    #[snafu(display("in-flight construction was abandoned before completion"))]
    Abandoned,
}
