//! Type universe: the classes, mixins and interfaces that get composed.
//!
//! A composition never inspects host-language types. Everything the
//! configuration builder and the synthesizer need to know about a class
//! (its fields, members, override declarations, implemented and required
//! interfaces, lifecycle hooks) is described here as data, and member
//! behavior is carried as closures over flat JSON field state.

use crate::error::{CompositionError, DispatchError};
use crate::invocation::Invocation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Opaque name of a class, mixin, value type or interface.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeName(pub String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Member visibility. Only `Public` members are callable from outside a
/// composition; everything else is reached through privileged wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Internal,
    Private,
}

impl Visibility {
    pub fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}

/// Structural member signature: parameter types and optional return type.
///
/// Override matching and duck matching compare signatures for equality;
/// parameter names are not part of the signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<TypeName>,
    #[serde(default)]
    pub returns: Option<TypeName>,
}

impl Signature {
    pub fn new<'a>(params: impl IntoIterator<Item = &'a str>, returns: Option<&str>) -> Self {
        Self {
            params: params.into_iter().map(TypeName::new).collect(),
            returns: returns.map(TypeName::new),
        }
    }

    /// `() -> ()`.
    pub fn unit() -> Self {
        Self::default()
    }

    /// `() -> returns`.
    pub fn returning(returns: &str) -> Self {
        Self::new([], Some(returns))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.params.iter().map(TypeName::as_str).collect();
        write!(f, "({})", params.join(", "))?;
        if let Some(returns) = &self.returns {
            write!(f, " -> {returns}")?;
        }
        Ok(())
    }
}

/// Flat field state of a target object or a mixin instance.
pub type FieldState = BTreeMap<String, Value>;

/// Member implementation.
pub type MethodBody =
    Arc<dyn Fn(&Invocation<'_>, &[Value]) -> Result<Value, DispatchError> + Send + Sync>;

/// Lifecycle callback run against a target object or mixin instance.
pub type LifecycleHook = Arc<dyn Fn(&Invocation<'_>) -> Result<(), DispatchError> + Send + Sync>;

/// What a method declares it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideDecl {
    /// Declared on a mixin: overrides the same-named member of the target.
    Target,
    /// Declared on the target: overrides the same-named member of this mixin.
    Mixin(TypeName),
}

/// A method declared on a class, mixin or value type.
#[derive(Clone)]
pub struct MethodDecl {
    pub name: String,
    pub signature: Signature,
    pub visibility: Visibility,
    pub overridable: bool,
    pub overrides: Option<OverrideDecl>,
    pub body: MethodBody,
}

impl MethodDecl {
    /// A public, non-overridable method.
    pub fn new<F>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(&Invocation<'_>, &[Value]) -> Result<Value, DispatchError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature,
            visibility: Visibility::Public,
            overridable: false,
            overrides: None,
            body: Arc::new(body),
        }
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn overridable(mut self) -> Self {
        self.overridable = true;
        self
    }

    pub fn overrides_target(mut self) -> Self {
        self.overrides = Some(OverrideDecl::Target);
        self
    }

    pub fn overrides_mixin(mut self, mixin: impl Into<String>) -> Self {
        self.overrides = Some(OverrideDecl::Mixin(TypeName::new(mixin)));
        self
    }
}

impl fmt::Debug for MethodDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDecl")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("visibility", &self.visibility)
            .field("overridable", &self.overridable)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

/// A property: a named pair of accessor methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub name: String,
    pub ty: TypeName,
    pub getter: Option<String>,
    pub setter: Option<String>,
}

/// An event: a named pair of add/remove accessor methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDecl {
    pub name: String,
    pub handler: TypeName,
    pub add: String,
    pub remove: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub default: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    ValueType,
}

/// Lifecycle points a type can hook into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    /// The instance finished initialization; mixins receive their proxies here.
    Initialized,
    /// Before field state is populated from a flat record.
    Deserializing,
    /// After field state is populated from a flat record.
    Deserialized,
    /// After the whole instance has been reconstructed.
    DeserializationCallback,
}

#[derive(Clone, Default)]
pub struct LifecycleHooks {
    pub on_initialized: Option<LifecycleHook>,
    pub on_deserializing: Option<LifecycleHook>,
    pub on_deserialized: Option<LifecycleHook>,
    pub deserialization_callback: Option<LifecycleHook>,
}

impl LifecycleHooks {
    pub fn get(&self, kind: HookKind) -> Option<&LifecycleHook> {
        match kind {
            HookKind::Initialized => self.on_initialized.as_ref(),
            HookKind::Deserializing => self.on_deserializing.as_ref(),
            HookKind::Deserialized => self.on_deserialized.as_ref(),
            HookKind::DeserializationCallback => self.deserialization_callback.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: HookKind) -> &mut Option<LifecycleHook> {
        match kind {
            HookKind::Initialized => &mut self.on_initialized,
            HookKind::Deserializing => &mut self.on_deserializing,
            HookKind::Deserialized => &mut self.on_deserialized,
            HookKind::DeserializationCallback => &mut self.deserialization_callback,
        }
    }
}

/// Description of a class, mixin or value type.
///
/// The same description serves as a composition target and as a mixin; the
/// override declarations on its methods decide which role they play.
#[derive(Clone)]
pub struct TypeDef {
    pub name: TypeName,
    pub kind: TypeKind,
    pub default_constructor: bool,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub properties: Vec<PropertyDecl>,
    pub events: Vec<EventDecl>,
    /// Interfaces this type implements explicitly.
    pub interfaces: Vec<TypeName>,
    /// Interfaces the composed entity must satisfy for this mixin (face types).
    pub this_requirements: Vec<TypeName>,
    /// Interfaces the rest of the chain must satisfy for this mixin (base-call types).
    pub base_requirements: Vec<TypeName>,
    pub hooks: LifecycleHooks,
}

impl TypeDef {
    pub fn class(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Class)
    }

    pub fn value_type(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::ValueType)
    }

    fn with_kind(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: TypeName::new(name),
            kind,
            default_constructor: true,
            fields: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            interfaces: Vec::new(),
            this_requirements: Vec::new(),
            base_requirements: Vec::new(),
            hooks: LifecycleHooks::default(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, default: Value) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            default,
        });
        self
    }

    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    pub fn property(
        mut self,
        name: impl Into<String>,
        ty: &str,
        getter: Option<&str>,
        setter: Option<&str>,
    ) -> Self {
        self.properties.push(PropertyDecl {
            name: name.into(),
            ty: TypeName::new(ty),
            getter: getter.map(str::to_string),
            setter: setter.map(str::to_string),
        });
        self
    }

    pub fn event(mut self, name: impl Into<String>, handler: &str, add: &str, remove: &str) -> Self {
        self.events.push(EventDecl {
            name: name.into(),
            handler: TypeName::new(handler),
            add: add.to_string(),
            remove: remove.to_string(),
        });
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(TypeName::new(interface));
        self
    }

    pub fn requires_this(mut self, interface: &str) -> Self {
        self.this_requirements.push(TypeName::new(interface));
        self
    }

    pub fn requires_base(mut self, interface: &str) -> Self {
        self.base_requirements.push(TypeName::new(interface));
        self
    }

    pub fn without_default_constructor(mut self) -> Self {
        self.default_constructor = false;
        self
    }

    pub fn hook<F>(mut self, kind: HookKind, hook: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<(), DispatchError> + Send + Sync + 'static,
    {
        *self.hooks.slot_mut(kind) = Some(Arc::new(hook));
        self
    }

    pub fn find_method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|method| method.name == name)
    }

    pub fn find_property(&self, name: &str) -> Option<&PropertyDecl> {
        self.properties.iter().find(|property| property.name == name)
    }

    pub fn find_event(&self, name: &str) -> Option<&EventDecl> {
        self.events.iter().find(|event| event.name == name)
    }

    /// Whether auto-instantiation can build this type without caller help.
    pub fn is_constructible(&self) -> bool {
        self.kind == TypeKind::ValueType || self.default_constructor
    }

    /// Field state of a freshly constructed instance.
    pub fn default_fields(&self) -> FieldState {
        self.fields
            .iter()
            .map(|field| (field.name.clone(), field.default.clone()))
            .collect()
    }

    fn validate(&self) -> Result<(), CompositionError> {
        let mut seen = BTreeSet::new();
        for method in &self.methods {
            if !seen.insert(method.name.as_str()) {
                return Err(CompositionError::configuration(
                    &self.name,
                    format!("duplicate member `{}`", method.name),
                ));
            }
        }
        let mut fields = BTreeSet::new();
        for field in &self.fields {
            if !fields.insert(field.name.as_str()) {
                return Err(CompositionError::configuration(
                    &self.name,
                    format!("duplicate field `{}`", field.name),
                ));
            }
        }
        let accessors = self
            .properties
            .iter()
            .flat_map(|p| p.getter.iter().chain(p.setter.iter()))
            .chain(self.events.iter().flat_map(|e| [&e.add, &e.remove]));
        for accessor in accessors {
            if self.find_method(accessor).is_none() {
                return Err(CompositionError::configuration(
                    &self.name,
                    format!("accessor `{accessor}` names no declared method"),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("fields", &self.fields)
            .field("methods", &self.methods)
            .field("interfaces", &self.interfaces)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceMethod {
    pub name: String,
    pub signature: Signature,
}

/// An interface: a named set of method signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDef {
    pub name: TypeName,
    pub methods: Vec<InterfaceMethod>,
}

impl InterfaceDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: TypeName::new(name),
            methods: Vec::new(),
        }
    }

    pub fn method(mut self, name: impl Into<String>, signature: Signature) -> Self {
        self.methods.push(InterfaceMethod {
            name: name.into(),
            signature,
        });
        self
    }

    pub fn find_method(&self, name: &str) -> Option<&InterfaceMethod> {
        self.methods.iter().find(|method| method.name == name)
    }
}

/// Registry of every type and interface a composition may reference.
///
/// Built once by the owner of the application lifetime and shared
/// read-only with the composition registry.
#[derive(Clone, Default)]
pub struct TypeUniverse {
    types: BTreeMap<TypeName, Arc<TypeDef>>,
    interfaces: BTreeMap<TypeName, Arc<InterfaceDef>>,
}

impl TypeUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class, mixin or value type.
    pub fn register_type(&mut self, def: TypeDef) -> Result<(), CompositionError> {
        def.validate()?;
        if self.contains(&def.name) {
            return Err(CompositionError::configuration(
                &def.name,
                "type is already registered",
            ));
        }
        self.types.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    pub fn register_interface(&mut self, def: InterfaceDef) -> Result<(), CompositionError> {
        if self.contains(&def.name) {
            return Err(CompositionError::configuration(
                &def.name,
                "type is already registered",
            ));
        }
        let mut seen = BTreeSet::new();
        for method in &def.methods {
            if !seen.insert(method.name.as_str()) {
                return Err(CompositionError::configuration(
                    &def.name,
                    format!("duplicate interface method `{}`", method.name),
                ));
            }
        }
        self.interfaces.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    pub fn with_type(mut self, def: TypeDef) -> Result<Self, CompositionError> {
        self.register_type(def)?;
        Ok(self)
    }

    pub fn with_interface(mut self, def: InterfaceDef) -> Result<Self, CompositionError> {
        self.register_interface(def)?;
        Ok(self)
    }

    pub fn type_def(&self, name: &TypeName) -> Option<&Arc<TypeDef>> {
        self.types.get(name)
    }

    pub fn interface(&self, name: &TypeName) -> Option<&Arc<InterfaceDef>> {
        self.interfaces.get(name)
    }

    pub fn contains(&self, name: &TypeName) -> bool {
        self.types.contains_key(name) || self.interfaces.contains_key(name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &TypeName> {
        self.types.keys()
    }

    pub fn interface_names(&self) -> impl Iterator<Item = &TypeName> {
        self.interfaces.keys()
    }
}
