use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::decoration::DecorationSet;
use crate::error::PluginApplyError;
use crate::state::EditorState;
use crate::transaction::Transaction;

pub(crate) type PluginValue = Arc<dyn Any + Send + Sync>;

/// A unit of derived state.
///
/// `apply` must be a pure function of its inputs: replaying the same
/// transaction over the same states yields the same value.
pub trait PluginSpec: Send + Sync + 'static {
    /// Value stored in every [`EditorState`].
    type State: Send + Sync + 'static;
    /// Value other code may address to this plugin through
    /// [`Transaction::set_meta`].
    type Meta: Send + Sync + 'static;

    fn name(&self) -> &str;

    fn init(&self, state: &EditorState) -> Self::State;

    fn apply(&self, cx: ApplyContext<'_, Self::Meta>, value: &Self::State) -> Result<Self::State, PluginApplyError>;

    fn decorations(&self, _value: &Self::State, _state: &EditorState) -> Option<DecorationSet> {
        None
    }
}

/// Inputs of one [`PluginSpec::apply`] call.
///
/// `new_state` already holds the new document and selection, the updated
/// values of plugins registered earlier, and the previous values of this
/// plugin and those after it.
pub struct ApplyContext<'a, M> {
    pub tr: &'a Transaction,
    pub meta: Option<&'a M>,
    pub old_state: &'a EditorState,
    pub new_state: &'a EditorState,
}

impl<M> ApplyContext<'_, M> {
    pub fn doc_changed(&self) -> bool {
        self.tr.doc_changed()
    }
}

/// Typed handle to a registered plugin: its index in the registry.
pub struct PluginKey<P> {
    index: usize,
    marker: PhantomData<fn() -> P>,
}

impl<P> Clone for PluginKey<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for PluginKey<P> {}

impl<P> PartialEq for PluginKey<P> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<P> Eq for PluginKey<P> {}

impl<P> fmt::Debug for PluginKey<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PluginKey({})", self.index)
    }
}

impl<P: PluginSpec> PluginKey<P> {
    fn new(index: usize) -> Self {
        PluginKey {
            index,
            marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The plugin's value in `state`, if `state` runs this plugin.
    pub fn get_state<'a>(&self, state: &'a EditorState) -> Option<&'a P::State> {
        state.plugin_value(self.index)?.downcast_ref::<P::State>()
    }
}

pub(crate) trait ErasedPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn init(&self, state: &EditorState) -> PluginValue;
    fn apply(
        &self,
        tr: &Transaction,
        value: &PluginValue,
        old_state: &EditorState,
        new_state: &EditorState,
    ) -> Result<PluginValue, PluginApplyError>;
    fn decorations(&self, value: &PluginValue, state: &EditorState) -> Option<DecorationSet>;
}

struct Registered<P> {
    index: usize,
    spec: P,
}

impl<P: PluginSpec> ErasedPlugin for Registered<P> {
    fn name(&self) -> &str {
        self.spec.name()
    }

    fn init(&self, state: &EditorState) -> PluginValue {
        Arc::new(self.spec.init(state))
    }

    fn apply(
        &self,
        tr: &Transaction,
        value: &PluginValue,
        old_state: &EditorState,
        new_state: &EditorState,
    ) -> Result<PluginValue, PluginApplyError> {
        let value = value
            .downcast_ref::<P::State>()
            .ok_or_else(|| PluginApplyError::new(self.spec.name(), "stored value has the wrong type"))?;
        let meta = tr
            .plugin_meta(self.index)
            .and_then(|meta| meta.downcast_ref::<P::Meta>());
        let cx = ApplyContext {
            tr,
            meta,
            old_state,
            new_state,
        };
        let next = self.spec.apply(cx, value)?;
        Ok(Arc::new(next))
    }

    fn decorations(&self, value: &PluginValue, state: &EditorState) -> Option<DecorationSet> {
        let value = value.downcast_ref::<P::State>()?;
        self.spec.decorations(value, state)
    }
}

/// Ordered plugin list under construction. Registration order is apply
/// order.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn ErasedPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        PluginRegistry::default()
    }

    pub fn register<P: PluginSpec>(&mut self, spec: P) -> PluginKey<P> {
        self.register_with(|_| spec)
    }

    /// Registers a plugin that needs its own key, e.g. to build widget
    /// actions addressed to itself.
    pub fn register_with<P, F>(&mut self, build: F) -> PluginKey<P>
    where
        P: PluginSpec,
        F: FnOnce(PluginKey<P>) -> P,
    {
        let key = PluginKey::new(self.plugins.len());
        let spec = build(key);
        self.plugins.push(Arc::new(Registered {
            index: key.index,
            spec,
        }));
        key
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn build(self) -> Plugins {
        Plugins(self.plugins.into())
    }
}

/// Immutable, shareable plugin list.
#[derive(Clone, Default)]
pub struct Plugins(Arc<[Arc<dyn ErasedPlugin>]>);

impl Plugins {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|plugin| plugin.name()).collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<dyn ErasedPlugin>> {
        self.0.iter()
    }
}

impl fmt::Debug for Plugins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Runs plugin code, turning a panic into a [`PluginApplyError`].
pub(crate) fn guarded<T, F>(plugin: &str, f: F) -> Result<T, PluginApplyError>
where
    F: FnOnce() -> Result<T, PluginApplyError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(PluginApplyError::new(plugin, panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
