//! Composed instances and mixin objects.
//!
//! A `ComposedInstance` is one target object plus one mixin object per
//! configured mixin, laid out by its `ComposedShape`. Instances are
//! single-threaded values: field state sits in `RefCell`s and member bodies
//! receive shared references. Different instances may live on different
//! threads while sharing one shape.

use crate::configuration::ClassConfiguration;
use crate::error::DispatchError;
use crate::invocation::{Continuation, Invocation};
use crate::key::ConfigurationKey;
use crate::model::{FieldState, HookKind, TypeName};
use crate::proxy::{self, BaseCallProxy};
use crate::shape::ComposedShape;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Runtime type of a mixin object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuntimeType {
    /// The mixin's declared type.
    Declared { name: TypeName },
    /// A per-configuration subtype exposing privileged wrappers for members
    /// the target overrides.
    Derived {
        mixin: TypeName,
        configuration: ConfigurationKey,
    },
}

impl RuntimeType {
    pub fn declared(name: impl Into<String>) -> Self {
        Self::Declared {
            name: TypeName::new(name),
        }
    }

    /// The mixin type this runtime type is, or derives from.
    pub fn mixin_type(&self) -> &TypeName {
        match self {
            Self::Declared { name } => name,
            Self::Derived { mixin, .. } => mixin,
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, Self::Derived { .. })
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared { name } => write!(f, "{name}"),
            Self::Derived {
                mixin,
                configuration,
            } => write!(f, "{mixin}@{}", configuration.short()),
        }
    }
}

/// Field state of one mixin, tagged with its runtime type.
#[derive(Debug)]
pub struct MixinObject {
    runtime_type: RuntimeType,
    fields: RefCell<FieldState>,
}

impl MixinObject {
    pub fn new(runtime_type: RuntimeType, fields: FieldState) -> Self {
        Self {
            runtime_type,
            fields: RefCell::new(fields),
        }
    }

    pub fn runtime_type(&self) -> &RuntimeType {
        &self.runtime_type
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub(crate) fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }

    pub fn fields(&self) -> FieldState {
        self.fields.borrow().clone()
    }

    pub(crate) fn replace_fields(&self, fields: FieldState) {
        *self.fields.borrow_mut() = fields;
    }
}

/// Which part of a composed instance is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Slot {
    Target,
    Mixin(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitState {
    Uninitialized,
    MixinsAssigned,
    Initialized,
}

/// Why an instance is being initialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMode {
    #[default]
    Construction,
    Deserialization,
}

#[derive(Debug)]
pub struct ComposedInstance {
    shape: Arc<ComposedShape>,
    target: RefCell<FieldState>,
    pub(crate) extensions: Vec<MixinObject>,
    attached: RefCell<BTreeSet<usize>>,
    pub(crate) state: InitState,
    pub(crate) mode: InitMode,
}

impl ComposedInstance {
    /// Raw storage: target fields at their defaults, no mixins yet.
    pub fn allocate(shape: Arc<ComposedShape>) -> Self {
        let target = shape.configuration().target().default_fields();
        Self {
            shape,
            target: RefCell::new(target),
            extensions: Vec::new(),
            attached: RefCell::new(BTreeSet::new()),
            state: InitState::Uninitialized,
            mode: InitMode::Construction,
        }
    }

    pub fn shape(&self) -> &Arc<ComposedShape> {
        &self.shape
    }

    pub fn configuration(&self) -> &Arc<ClassConfiguration> {
        self.shape.configuration()
    }

    pub fn state(&self) -> InitState {
        self.state
    }

    pub fn mode(&self) -> InitMode {
        self.mode
    }

    /// Mixin objects in configuration order.
    pub fn extensions(&self) -> &[MixinObject] {
        &self.extensions
    }

    pub fn mixin(&self, index: usize) -> Option<&MixinObject> {
        self.extensions.get(index)
    }

    pub fn mixin_of(&self, mixin: &TypeName) -> Option<&MixinObject> {
        self.configuration()
            .mixin_index_of(mixin)
            .and_then(|index| self.extensions.get(index))
    }

    pub fn target_field(&self, name: &str) -> Option<Value> {
        self.target.borrow().get(name).cloned()
    }

    pub fn set_target_field(&self, name: &str, value: Value) -> Result<(), DispatchError> {
        self.set_field(Slot::Target, name, value)
    }

    pub fn target_fields(&self) -> FieldState {
        self.target.borrow().clone()
    }

    pub(crate) fn slot_field(&self, slot: Slot, name: &str) -> Option<Value> {
        match slot {
            Slot::Target => self.target_field(name),
            Slot::Mixin(index) => self.extensions.get(index).and_then(|m| m.field(name)),
        }
    }

    /// Write one field of a slot. Only fields the slot's type declares can
    /// be written, so captured state always matches the shape's layout.
    pub fn set_field(&self, slot: Slot, name: &str, value: Value) -> Result<(), DispatchError> {
        self.check_declared(slot, name)?;
        match slot {
            Slot::Target => {
                self.target.borrow_mut().insert(name.to_string(), value);
            }
            Slot::Mixin(index) => {
                if let Some(mixin) = self.extensions.get(index) {
                    mixin.set_field(name, value);
                }
            }
        }
        Ok(())
    }

    /// Replace the whole field state of a slot; every name must be declared.
    pub fn replace_fields(&self, slot: Slot, fields: FieldState) -> Result<(), DispatchError> {
        for name in fields.keys() {
            self.check_declared(slot, name)?;
        }
        match slot {
            Slot::Target => *self.target.borrow_mut() = fields,
            Slot::Mixin(index) => {
                if let Some(mixin) = self.extensions.get(index) {
                    mixin.replace_fields(fields);
                }
            }
        }
        Ok(())
    }

    fn check_declared(&self, slot: Slot, name: &str) -> Result<(), DispatchError> {
        let layout = self.shape.layout();
        let configuration = self.configuration();
        let (owner, declared) = match slot {
            Slot::Target => (configuration.target_name().to_string(), Some(&layout.target)),
            Slot::Mixin(index) => (
                configuration
                    .mixin(index)
                    .map_or_else(|| format!("mixin slot {index}"), |m| m.name().to_string()),
                layout.mixins.get(index),
            ),
        };
        if declared.is_some_and(|fields| fields.iter().any(|f| f == name)) {
            return Ok(());
        }
        Err(DispatchError::UndeclaredField {
            owner,
            field: name.to_string(),
        })
    }

    pub(crate) fn slot_fields(&self, slot: Slot) -> FieldState {
        match slot {
            Slot::Target => self.target_fields(),
            Slot::Mixin(index) => self
                .extensions
                .get(index)
                .map(MixinObject::fields)
                .unwrap_or_default(),
        }
    }

    /// Base-call proxy at `depth`, `0..=mixin_count`.
    pub fn base_call_proxy(&self, depth: usize) -> Result<BaseCallProxy<'_>, DispatchError> {
        let mixin_count = self.shape.mixin_count();
        if depth > mixin_count {
            return Err(DispatchError::InvalidDepth { depth, mixin_count });
        }
        self.attached.borrow_mut().insert(depth);
        Ok(BaseCallProxy::new(self, depth))
    }

    /// The depth-0 proxy every external call goes through.
    pub fn first_base_call_proxy(&self) -> Result<BaseCallProxy<'_>, DispatchError> {
        self.base_call_proxy(0)
    }

    pub(crate) fn detach_proxies(&self) {
        self.attached.borrow_mut().clear();
    }

    /// Depths whose proxies have been handed out.
    pub fn attached_depths(&self) -> Vec<usize> {
        self.attached.borrow().iter().copied().collect()
    }

    /// Call a member by plain name, as an outside caller would.
    ///
    /// Reaches public target members (through their chains) and members
    /// publicly introduced by mixins.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, DispatchError> {
        self.ensure_initialized()?;
        if let Some(member) = self.configuration().target_method(name)
            && !member.visibility.is_public()
        {
            return Err(DispatchError::AccessDenied {
                member: name.to_string(),
            });
        }
        match self.shape.surface_forward(name) {
            Some(forward) => proxy::run_forward(self, forward, args),
            None => Err(DispatchError::MemberNotFound {
                member: name.to_string(),
            }),
        }
    }

    /// Call an interface method on the composed entity.
    pub fn call_interface(
        &self,
        interface: &str,
        method: &str,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        self.ensure_initialized()?;
        match self
            .shape
            .interface_forward(&TypeName::new(interface), method)
        {
            Some(forward) => proxy::run_forward(self, forward, args),
            None => Err(DispatchError::MemberNotFound {
                member: format!("{interface}.{method}"),
            }),
        }
    }

    /// Whether the composed entity answers to `interface`.
    pub fn implements(&self, interface: &str) -> bool {
        let interface = TypeName::new(interface);
        self.shape.interfaces().contains(&&interface)
    }

    pub fn get_property(&self, name: &str) -> Result<Value, DispatchError> {
        let getter = self.accessor(name, |p| p.getter.as_deref())?;
        self.call(&getter, &[])
    }

    pub fn set_property(&self, name: &str, value: Value) -> Result<(), DispatchError> {
        let setter = self.accessor(name, |p| p.setter.as_deref())?;
        self.call(&setter, &[value]).map(|_| ())
    }

    pub fn add_handler(&self, event: &str, handler: Value) -> Result<(), DispatchError> {
        let add = self.event_accessor(event, |e| &e.add)?;
        self.call(&add, &[handler]).map(|_| ())
    }

    pub fn remove_handler(&self, event: &str, handler: Value) -> Result<(), DispatchError> {
        let remove = self.event_accessor(event, |e| &e.remove)?;
        self.call(&remove, &[handler]).map(|_| ())
    }

    /// Run a lifecycle hook of one slot, if it declares one.
    pub fn run_hook(&self, slot: Slot, kind: HookKind) -> Result<(), DispatchError> {
        let configuration = self.configuration();
        let def = match slot {
            Slot::Target => Some(configuration.target()),
            Slot::Mixin(index) => configuration.mixin(index).map(|m| &m.definition),
        };
        let Some(hook) = def.and_then(|d| d.hooks.get(kind)) else {
            return Ok(());
        };
        tracing::trace!(?slot, ?kind, "lifecycle hook");
        let invocation = Invocation::new(self, slot, hook_name(kind), Continuation::End);
        hook(&invocation)
    }

    fn ensure_initialized(&self) -> Result<(), DispatchError> {
        if self.state != InitState::Initialized {
            return Err(DispatchError::NotInitialized);
        }
        Ok(())
    }

    /// Accessor method of a property declared by the target or introduced
    /// publicly by a mixin.
    fn accessor(
        &self,
        name: &str,
        pick: impl Fn(&crate::model::PropertyDecl) -> Option<&str>,
    ) -> Result<String, DispatchError> {
        let configuration = self.configuration();
        let declared = std::iter::once(configuration.target())
            .chain(configuration.mixins().iter().map(|m| &m.definition))
            .filter_map(|def| def.find_property(name));
        for property in declared {
            if let Some(accessor) = pick(property) {
                return Ok(accessor.to_string());
            }
        }
        Err(DispatchError::MemberNotFound {
            member: name.to_string(),
        })
    }

    fn event_accessor(
        &self,
        name: &str,
        pick: impl Fn(&crate::model::EventDecl) -> &String,
    ) -> Result<String, DispatchError> {
        let configuration = self.configuration();
        std::iter::once(configuration.target())
            .chain(configuration.mixins().iter().map(|m| &m.definition))
            .find_map(|def| def.find_event(name))
            .map(|event| pick(event).clone())
            .ok_or_else(|| DispatchError::MemberNotFound {
                member: name.to_string(),
            })
    }
}

fn hook_name(kind: HookKind) -> &'static str {
    match kind {
        HookKind::Initialized => "on_initialized",
        HookKind::Deserializing => "on_deserializing",
        HookKind::Deserialized => "on_deserialized",
        HookKind::DeserializationCallback => "on_deserialization",
    }
}
