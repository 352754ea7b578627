//! Configuration model: a target class plus its ordered mixins.
//!
//! ```text
//! CompositionRequest  ← what a configuration author asks for
//!     │ normalize (dependency ordering, interface set)
//! ConfigurationDescriptor ← structural identity, cache key, persisted form
//!     │ build (member tables, override validation, requirements)
//! ClassConfiguration  ← immutable, shared behind Arc
//! ```
//!
//! Mixin order is chain depth: mixin `i` sits at depth `i + 1` of every
//! override chain, the target itself at depth 0 and at the terminus.

use crate::error::CompositionError;
use crate::key::ConfigurationKey;
use crate::model::{
    EventDecl, InterfaceDef, OverrideDecl, PropertyDecl, Signature, TypeDef, TypeKind, TypeName,
    TypeUniverse, Visibility,
};
use crate::requirements::{self, ReceivedInterface, RequirementSatisfactionMap};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// Visibility of the members a mixin introduces through its interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntroducedVisibility {
    /// Callable by plain member name on the composed entity.
    #[default]
    Public,
    /// Callable only through the interface (explicit implementation).
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixinRequest {
    pub mixin: TypeName,
    #[serde(default)]
    pub introduced_visibility: IntroducedVisibility,
    /// Mixins this one must be ordered after.
    #[serde(default)]
    pub dependencies: Vec<TypeName>,
}

impl MixinRequest {
    pub fn new(mixin: impl Into<String>) -> Self {
        Self {
            mixin: TypeName::new(mixin),
            introduced_visibility: IntroducedVisibility::Public,
            dependencies: Vec::new(),
        }
    }

    pub fn private_introductions(mut self) -> Self {
        self.introduced_visibility = IntroducedVisibility::Private;
        self
    }

    pub fn after(mut self, mixin: impl Into<String>) -> Self {
        self.dependencies.push(TypeName::new(mixin));
        self
    }
}

/// A request for a composed class, as written by a configuration author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionRequest {
    pub target: TypeName,
    #[serde(default)]
    pub mixins: Vec<MixinRequest>,
    /// Interfaces the composed entity must satisfy as a whole.
    #[serde(default)]
    pub interfaces: Vec<TypeName>,
}

impl CompositionRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: TypeName::new(target),
            mixins: Vec::new(),
            interfaces: Vec::new(),
        }
    }

    pub fn mixin(self, mixin: impl Into<String>) -> Self {
        self.with(MixinRequest::new(mixin))
    }

    pub fn with(mut self, request: MixinRequest) -> Self {
        self.mixins.push(request);
        self
    }

    pub fn requires(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(TypeName::new(interface));
        self
    }

    /// Order mixins and canonicalize the interface set.
    ///
    /// Ordering is a stable topological sort: a mixin is placed as soon as
    /// every mixin it depends on is placed, earlier requests first.
    pub fn normalize(&self) -> Result<ConfigurationDescriptor, CompositionError> {
        let mut names = HashSet::new();
        for request in &self.mixins {
            if request.mixin == self.target {
                return Err(CompositionError::configuration(
                    &self.target,
                    "a class cannot be mixed into itself",
                ));
            }
            if !names.insert(&request.mixin) {
                return Err(CompositionError::configuration(
                    &self.target,
                    format!("mixin {} is listed more than once", request.mixin),
                ));
            }
        }
        for request in &self.mixins {
            if let Some(missing) = request.dependencies.iter().find(|d| !names.contains(d)) {
                return Err(CompositionError::configuration(
                    &self.target,
                    format!(
                        "mixin {} depends on {missing}, which is not part of the configuration",
                        request.mixin
                    ),
                ));
            }
        }

        let mut pending: Vec<&MixinRequest> = self.mixins.iter().collect();
        let mut placed: HashSet<&TypeName> = HashSet::new();
        let mut ordered = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let Some(next) = pending
                .iter()
                .position(|r| r.dependencies.iter().all(|d| placed.contains(d)))
            else {
                let cycle: Vec<String> = pending.iter().map(|r| r.mixin.to_string()).collect();
                return Err(CompositionError::configuration(
                    &self.target,
                    format!("mixin dependencies form a cycle among {}", cycle.join(", ")),
                ));
            };
            let request = pending.remove(next);
            placed.insert(&request.mixin);
            let mut request = request.clone();
            request.dependencies.sort();
            request.dependencies.dedup();
            ordered.push(request);
        }

        let interfaces: BTreeSet<TypeName> = self.interfaces.iter().cloned().collect();
        Ok(ConfigurationDescriptor {
            target: self.target.clone(),
            mixins: ordered,
            interfaces: interfaces.into_iter().collect(),
        })
    }
}

/// Structurally reproducible identity of a configuration.
///
/// Equality and hashing are structural; this is the key of every cache and
/// the form in which a configuration is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationDescriptor {
    pub target: TypeName,
    /// Mixins in chain order.
    pub mixins: Vec<MixinRequest>,
    /// Sorted, de-duplicated.
    pub interfaces: Vec<TypeName>,
}

impl ConfigurationDescriptor {
    pub fn key(&self) -> ConfigurationKey {
        let mut builder = ConfigurationKey::builder()
            .field("target", self.target.as_str())
            .field_int("mixins", self.mixins.len() as u64);
        for (index, mixin) in self.mixins.iter().enumerate() {
            let after: Vec<&str> = mixin.dependencies.iter().map(TypeName::as_str).collect();
            builder = builder
                .field(&format!("mixin[{index}]"), mixin.mixin.as_str())
                .field(
                    &format!("mixin[{index}].visibility"),
                    match mixin.introduced_visibility {
                        IntroducedVisibility::Public => "public",
                        IntroducedVisibility::Private => "private",
                    },
                )
                .field(&format!("mixin[{index}].after"), &after.join(","));
        }
        for interface in &self.interfaces {
            builder = builder.field("interface", interface.as_str());
        }
        builder.finish()
    }

    /// Already-normalized descriptors normalize to themselves.
    pub fn renormalize(&self) -> Result<Self, CompositionError> {
        CompositionRequest {
            target: self.target.clone(),
            mixins: self.mixins.clone(),
            interfaces: self.interfaces.clone(),
        }
        .normalize()
    }
}

/// Something that overrides a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Overrider {
    Mixin { index: usize, method: String },
    Target { method: String },
}

/// One row of a member table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodMember {
    pub name: String,
    pub signature: Signature,
    pub visibility: Visibility,
    pub overridable: bool,
    pub declared_override: Option<OverrideDecl>,
    /// Entities overriding this member. Mixin overriders are in index order.
    pub overrides: Vec<Overrider>,
}

impl MethodMember {
    fn from_decl(def: &TypeDef) -> Vec<Self> {
        def.methods
            .iter()
            .map(|decl| Self {
                name: decl.name.clone(),
                signature: decl.signature.clone(),
                visibility: decl.visibility,
                overridable: decl.overridable,
                declared_override: decl.overrides.clone(),
                overrides: Vec::new(),
            })
            .collect()
    }

    pub fn is_overridden(&self) -> bool {
        !self.overrides.is_empty()
    }

    /// Mixin indices overriding this member, ascending.
    pub fn overriding_mixins(&self) -> impl Iterator<Item = usize> + '_ {
        self.overrides.iter().filter_map(|o| match o {
            Overrider::Mixin { index, .. } => Some(*index),
            Overrider::Target { .. } => None,
        })
    }

    pub fn target_overrider(&self) -> Option<&str> {
        self.overrides.iter().find_map(|o| match o {
            Overrider::Target { method } => Some(method.as_str()),
            Overrider::Mixin { .. } => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyMember {
    pub decl: PropertyDecl,
    /// Mixins overriding either accessor, ascending.
    pub overrides: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMember {
    pub decl: EventDecl,
    /// Mixins overriding either accessor, ascending.
    pub overrides: Vec<usize>,
}

/// One mixin of a configuration.
#[derive(Debug, Clone)]
pub struct MixinConfiguration {
    pub mixin_index: usize,
    pub definition: Arc<TypeDef>,
    pub introduced_visibility: IntroducedVisibility,
    pub dependencies: Vec<TypeName>,
    /// Set when the target overrides one of this mixin's members, so the
    /// mixin needs a derived runtime type exposing privileged wrappers.
    pub needs_derived_mixin_type: bool,
    pub methods: Vec<MethodMember>,
}

impl MixinConfiguration {
    pub fn name(&self) -> &TypeName {
        &self.definition.name
    }

    pub fn method(&self, name: &str) -> Option<&MethodMember> {
        self.methods.iter().find(|m| m.name == name)
    }

    fn method_mut(&mut self, name: &str) -> Option<&mut MethodMember> {
        self.methods.iter_mut().find(|m| m.name == name)
    }
}

/// Immutable description of a composed class.
#[derive(Debug, Clone)]
pub struct ClassConfiguration {
    descriptor: ConfigurationDescriptor,
    key: ConfigurationKey,
    target: Arc<TypeDef>,
    mixins: Vec<MixinConfiguration>,
    methods: Vec<MethodMember>,
    properties: Vec<PropertyMember>,
    events: Vec<EventMember>,
    received_interfaces: Vec<ReceivedInterface>,
    requirements: RequirementSatisfactionMap,
    /// Every interface the configuration mentions.
    interfaces: BTreeMap<TypeName, Arc<InterfaceDef>>,
}

impl PartialEq for ClassConfiguration {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor == other.descriptor
    }
}

impl Eq for ClassConfiguration {}

impl ClassConfiguration {
    /// Build a configuration from a request. Pure and deterministic.
    pub fn build(
        universe: &TypeUniverse,
        request: &CompositionRequest,
    ) -> Result<Self, CompositionError> {
        Self::from_descriptor(universe, request.normalize()?)
    }

    /// Build a configuration from an already normalized descriptor.
    ///
    /// Descriptors that are not in normal form (duplicate mixins, mixins out
    /// of dependency order, unsorted interfaces) are rejected.
    pub fn from_descriptor(
        universe: &TypeUniverse,
        descriptor: ConfigurationDescriptor,
    ) -> Result<Self, CompositionError> {
        if descriptor.renormalize()? != descriptor {
            return Err(CompositionError::configuration(
                &descriptor.target,
                "descriptor is not in normal form",
            ));
        }
        let target_name = &descriptor.target;
        let target = universe
            .type_def(target_name)
            .ok_or_else(|| CompositionError::configuration(target_name, "unknown target type"))?
            .clone();
        if target.kind != TypeKind::Class {
            return Err(CompositionError::configuration(
                target_name,
                "only classes can be composition targets",
            ));
        }

        let mut mixins = Vec::with_capacity(descriptor.mixins.len());
        for (mixin_index, request) in descriptor.mixins.iter().enumerate() {
            let definition = universe
                .type_def(&request.mixin)
                .ok_or_else(|| {
                    CompositionError::configuration(
                        target_name,
                        format!("unknown mixin type {}", request.mixin),
                    )
                })?
                .clone();
            mixins.push(MixinConfiguration {
                mixin_index,
                methods: MethodMember::from_decl(&definition),
                definition,
                introduced_visibility: request.introduced_visibility,
                dependencies: request.dependencies.clone(),
                needs_derived_mixin_type: false,
            });
        }

        let mut methods = MethodMember::from_decl(&target);
        apply_mixin_overrides(&target, &mut methods, &mut mixins)?;
        apply_target_overrides(&target, &mut mixins)?;
        check_single_override(&target, &mixins)?;
        for mixin in &mut mixins {
            mixin.needs_derived_mixin_type = mixin.methods.iter().any(MethodMember::is_overridden);
        }

        let properties = target
            .properties
            .iter()
            .map(|decl| PropertyMember {
                overrides: accessor_overrides(
                    &methods,
                    decl.getter.iter().chain(decl.setter.iter()),
                ),
                decl: decl.clone(),
            })
            .collect();
        let events = target
            .events
            .iter()
            .map(|decl| EventMember {
                overrides: accessor_overrides(&methods, [&decl.add, &decl.remove]),
                decl: decl.clone(),
            })
            .collect();

        requirements::check_target_interfaces(universe, &target)?;
        let received_interfaces = requirements::received_interfaces(universe, &target, &mixins)?;
        let requirements = requirements::satisfy(
            universe,
            &target,
            &descriptor.interfaces,
            &mixins,
            &received_interfaces,
        )?;

        let mentioned = target
            .interfaces
            .iter()
            .chain(descriptor.interfaces.iter())
            .chain(mixins.iter().flat_map(|m| {
                let def = &m.definition;
                def.interfaces
                    .iter()
                    .chain(def.this_requirements.iter())
                    .chain(def.base_requirements.iter())
            }));
        let interfaces = mentioned
            .filter_map(|name| universe.interface(name).map(|def| (name.clone(), def.clone())))
            .collect();

        let key = descriptor.key();
        Ok(Self {
            descriptor,
            key,
            target,
            mixins,
            methods,
            properties,
            events,
            received_interfaces,
            requirements,
            interfaces,
        })
    }

    pub fn descriptor(&self) -> &ConfigurationDescriptor {
        &self.descriptor
    }

    pub fn key(&self) -> &ConfigurationKey {
        &self.key
    }

    pub fn target(&self) -> &Arc<TypeDef> {
        &self.target
    }

    pub fn target_name(&self) -> &TypeName {
        &self.target.name
    }

    pub fn mixins(&self) -> &[MixinConfiguration] {
        &self.mixins
    }

    pub fn mixin_count(&self) -> usize {
        self.mixins.len()
    }

    pub fn mixin(&self, index: usize) -> Option<&MixinConfiguration> {
        self.mixins.get(index)
    }

    pub fn mixin_index_of(&self, name: &TypeName) -> Option<usize> {
        self.mixins.iter().position(|m| m.name() == name)
    }

    /// Target-declared member table.
    pub fn methods(&self) -> &[MethodMember] {
        &self.methods
    }

    pub fn target_method(&self, name: &str) -> Option<&MethodMember> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn properties(&self) -> &[PropertyMember] {
        &self.properties
    }

    pub fn events(&self) -> &[EventMember] {
        &self.events
    }

    pub fn received_interfaces(&self) -> &[ReceivedInterface] {
        &self.received_interfaces
    }

    pub fn requirements(&self) -> &RequirementSatisfactionMap {
        &self.requirements
    }

    pub fn interface(&self, name: &TypeName) -> Option<&Arc<InterfaceDef>> {
        self.interfaces.get(name)
    }
}

/// Register every `OverrideDecl::Target` declared by a mixin on the target
/// member it names, and every mixin-to-mixin declaration on the mixin member.
fn apply_mixin_overrides(
    target: &TypeDef,
    methods: &mut [MethodMember],
    mixins: &mut [MixinConfiguration],
) -> Result<(), CompositionError> {
    let mut mixin_to_mixin = Vec::new();
    for mixin in mixins.iter() {
        for decl in &mixin.definition.methods {
            match &decl.overrides {
                Some(OverrideDecl::Target) => {
                    let Some(member) = methods.iter_mut().find(|m| m.name == decl.name) else {
                        return Err(CompositionError::configuration(
                            &target.name,
                            format!(
                                "{}.{} overrides a target member the target does not declare",
                                mixin.name(),
                                decl.name
                            ),
                        ));
                    };
                    check_overridable(&target.name, &target.name, member, &decl.signature)?;
                    member.overrides.push(Overrider::Mixin {
                        index: mixin.mixin_index,
                        method: decl.name.clone(),
                    });
                }
                Some(OverrideDecl::Mixin(overridden)) => {
                    mixin_to_mixin.push((mixin.mixin_index, overridden.clone(), decl.name.clone()));
                }
                None => {}
            }
        }
    }

    for (index, overridden, method) in mixin_to_mixin {
        let Some(member) = mixins
            .iter_mut()
            .find(|m| m.name() == &overridden)
            .and_then(|m| m.method_mut(&method))
        else {
            return Err(CompositionError::configuration(
                &target.name,
                format!("override of {overridden}.{method} names no member of the configuration"),
            ));
        };
        member.overrides.push(Overrider::Mixin { index, method });
    }
    Ok(())
}

/// Register every `OverrideDecl::Mixin` declared by the target.
fn apply_target_overrides(
    target: &TypeDef,
    mixins: &mut [MixinConfiguration],
) -> Result<(), CompositionError> {
    for decl in &target.methods {
        let Some(OverrideDecl::Mixin(overridden)) = &decl.overrides else {
            continue;
        };
        let Some(mixin) = mixins.iter_mut().find(|m| m.name() == overridden) else {
            return Err(CompositionError::configuration(
                &target.name,
                format!(
                    "{}.{} overrides a member of {overridden}, which is not part of the configuration",
                    target.name, decl.name
                ),
            ));
        };
        let mixin_name = mixin.name().clone();
        let Some(member) = mixin.method_mut(&decl.name) else {
            return Err(CompositionError::configuration(
                &target.name,
                format!("{mixin_name} declares no member `{}` to override", decl.name),
            ));
        };
        check_overridable(&target.name, &mixin_name, member, &decl.signature)?;
        member.overrides.push(Overrider::Target {
            method: decl.name.clone(),
        });
    }
    Ok(())
}

fn check_overridable(
    target: &TypeName,
    owner: &TypeName,
    member: &MethodMember,
    signature: &Signature,
) -> Result<(), CompositionError> {
    if !member.overridable {
        return Err(CompositionError::configuration(
            target,
            format!("{owner}.{} is not overridable", member.name),
        ));
    }
    if &member.signature != signature {
        return Err(CompositionError::configuration(
            target,
            format!(
                "override of {owner}.{} has signature {signature}, expected {}",
                member.name, member.signature
            ),
        ));
    }
    Ok(())
}

/// A mixin member may be overridden at most once, and only by the target.
fn check_single_override(
    target: &TypeDef,
    mixins: &[MixinConfiguration],
) -> Result<(), CompositionError> {
    for mixin in mixins {
        for member in &mixin.methods {
            if member.overrides.len() > 1 {
                return Err(CompositionError::unsupported(
                    &target.name,
                    format!(
                        "{}.{} is overridden {} times; a mixin member supports one override",
                        mixin.name(),
                        member.name,
                        member.overrides.len()
                    ),
                ));
            }
            if let Some(Overrider::Mixin { index, .. }) = member.overrides.first() {
                return Err(CompositionError::unsupported(
                    &target.name,
                    format!(
                        "{}.{} is overridden by mixin {}; only the target may override mixin members",
                        mixin.name(),
                        member.name,
                        mixins[*index].name()
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn accessor_overrides<'a>(
    methods: &[MethodMember],
    accessors: impl IntoIterator<Item = &'a String>,
) -> Vec<usize> {
    let mut indices: BTreeSet<usize> = BTreeSet::new();
    for accessor in accessors {
        if let Some(member) = methods.iter().find(|m| &m.name == accessor) {
            indices.extend(member.overriding_mixins());
        }
    }
    indices.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MethodDecl;
    use serde_json::Value;

    fn method(name: &str) -> MethodDecl {
        MethodDecl::new(name, Signature::unit(), |_, _| Ok(Value::Null))
    }

    fn universe() -> TypeUniverse {
        TypeUniverse::new()
            .with_type(TypeDef::class("Order").method(method("save").overridable()))
            .and_then(|u| u.with_type(TypeDef::class("Audit").method(method("save").overrides_target())))
            .and_then(|u| u.with_type(TypeDef::class("Cache").method(method("save").overrides_target())))
            .and_then(|u| u.with_type(TypeDef::class("Log")))
            .unwrap()
    }

    #[test]
    fn ordering_respects_dependencies() {
        let descriptor = CompositionRequest::new("Order")
            .with(MixinRequest::new("Audit").after("Log"))
            .mixin("Cache")
            .mixin("Log")
            .normalize()
            .unwrap();
        let order: Vec<&str> = descriptor.mixins.iter().map(|m| m.mixin.as_str()).collect();
        assert_eq!(order, ["Cache", "Log", "Audit"]);
    }

    #[test]
    fn dependency_cycles_are_rejected() {
        let err = CompositionRequest::new("Order")
            .with(MixinRequest::new("Audit").after("Log"))
            .with(MixinRequest::new("Log").after("Audit"))
            .normalize()
            .unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn dependency_outside_configuration_is_rejected() {
        let err = CompositionRequest::new("Order")
            .with(MixinRequest::new("Audit").after("Cache"))
            .normalize()
            .unwrap_err();
        assert!(err.to_string().contains("not part of the configuration"));
    }

    #[test]
    fn interface_set_is_canonical() {
        let a = CompositionRequest::new("Order")
            .requires("IB")
            .requires("IA")
            .requires("IB")
            .normalize()
            .unwrap();
        let b = CompositionRequest::new("Order")
            .requires("IA")
            .requires("IB")
            .normalize()
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn descriptors_out_of_normal_form_are_rejected() {
        let mut reordered = CompositionRequest::new("Order")
            .with(MixinRequest::new("Audit").after("Log"))
            .mixin("Log")
            .normalize()
            .unwrap();
        reordered.mixins.reverse();
        let err = ClassConfiguration::from_descriptor(&universe(), reordered).unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error for Order: descriptor is not in normal form"
        );

        let mut duplicated = CompositionRequest::new("Order").mixin("Cache").normalize().unwrap();
        duplicated.mixins.push(MixinRequest::new("Cache"));
        let err = ClassConfiguration::from_descriptor(&universe(), duplicated).unwrap_err();
        assert!(err.to_string().contains("listed more than once"));
    }

    #[test]
    fn mixin_overrides_are_collected_in_order() {
        let config = ClassConfiguration::build(
            &universe(),
            &CompositionRequest::new("Order").mixin("Log").mixin("Audit").mixin("Cache"),
        )
        .unwrap();
        let save = config.target_method("save").unwrap();
        assert_eq!(save.overriding_mixins().collect::<Vec<_>>(), [1, 2]);
        assert!(config.mixins().iter().all(|m| !m.needs_derived_mixin_type));
    }

    #[test]
    fn overriding_a_sealed_member_is_rejected() {
        let universe = TypeUniverse::new()
            .with_type(TypeDef::class("Order").method(method("save")))
            .and_then(|u| u.with_type(TypeDef::class("Audit").method(method("save").overrides_target())))
            .unwrap();
        let err = ClassConfiguration::build(&universe, &CompositionRequest::new("Order").mixin("Audit"))
            .unwrap_err();
        assert!(err.to_string().contains("not overridable"));
    }

    #[test]
    fn target_override_marks_mixin_as_derived() {
        let universe = TypeUniverse::new()
            .with_type(TypeDef::class("Order").method(method("flush").overrides_mixin("Cache")))
            .and_then(|u| u.with_type(TypeDef::class("Cache").method(method("flush").overridable())))
            .unwrap();
        let config =
            ClassConfiguration::build(&universe, &CompositionRequest::new("Order").mixin("Cache"))
                .unwrap();
        let cache = config.mixin(0).unwrap();
        assert!(cache.needs_derived_mixin_type);
        assert_eq!(cache.method("flush").unwrap().target_overrider(), Some("flush"));
    }

    #[test]
    fn value_types_cannot_be_targets() {
        let universe = TypeUniverse::new()
            .with_type(TypeDef::value_type("Point"))
            .unwrap();
        let err = ClassConfiguration::build(&universe, &CompositionRequest::new("Point")).unwrap_err();
        assert!(matches!(err, CompositionError::Configuration { .. }));
    }
}
