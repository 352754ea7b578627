//! Requirement satisfaction: received interfaces, face types, base-call types.
//!
//! Structural ("duck") matching happens here, once, while the configuration
//! is built. The result is a `RequirementSatisfactionMap` naming a concrete
//! implementation for every required interface method; nothing is matched
//! by shape at call time.

use crate::configuration::{IntroducedVisibility, MixinConfiguration};
use crate::error::CompositionError;
use crate::model::{InterfaceDef, InterfaceMethod, TypeDef, TypeName, TypeUniverse, Visibility};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An interface a mixin contributes to the composed entity's surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedInterface {
    pub interface: TypeName,
    pub mixin_index: usize,
    pub visibility: IntroducedVisibility,
}

/// Where a required face method is implemented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequiredImplementation {
    /// The target implements the interface explicitly.
    Target { method: String },
    /// A mixin introduces the interface.
    Mixin { index: usize, method: String },
    /// The target declares a public member with the same name and signature.
    Duck { method: String },
}

/// Where a base-call method requested by a mixin continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaseCallTarget {
    /// A target-declared member: continue its override chain.
    Chain { member: String },
    /// A later mixin introduces the interface.
    Mixin { index: usize, method: String },
}

/// Who asked for a face type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Requester {
    Configuration,
    Mixin(usize),
}

/// An interface the composed entity must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredFaceType {
    pub interface: TypeName,
    pub requested_by: Vec<Requester>,
    pub methods: BTreeMap<String, RequiredImplementation>,
}

/// An interface mixin `mixin_index` calls through its base-call proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredBaseCallType {
    pub interface: TypeName,
    pub mixin_index: usize,
    pub methods: BTreeMap<String, BaseCallTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementSatisfactionMap {
    pub faces: Vec<RequiredFaceType>,
    pub base_calls: Vec<RequiredBaseCallType>,
}

impl RequirementSatisfactionMap {
    pub fn face(&self, interface: &TypeName) -> Option<&RequiredFaceType> {
        self.faces.iter().find(|face| &face.interface == interface)
    }

    pub fn base_calls_of(&self, mixin_index: usize) -> impl Iterator<Item = &RequiredBaseCallType> {
        self.base_calls
            .iter()
            .filter(move |req| req.mixin_index == mixin_index)
    }
}

fn lookup<'u>(
    universe: &'u TypeUniverse,
    target: &TypeName,
    name: &TypeName,
) -> Result<&'u Arc<InterfaceDef>, CompositionError> {
    universe
        .interface(name)
        .ok_or_else(|| CompositionError::configuration(target, format!("unknown interface {name}")))
}

/// Check that `def` declares every method of `interface` with a matching
/// signature. Returns the first mismatch as a message.
fn check_implements(def: &TypeDef, interface: &InterfaceDef) -> Result<(), String> {
    for required in &interface.methods {
        match def.find_method(&required.name) {
            Some(method) if method.signature == required.signature => {}
            Some(method) => {
                return Err(format!(
                    "{}.{} has signature {} but {} requires {}",
                    def.name, method.name, method.signature, interface.name, required.signature
                ));
            }
            None => {
                return Err(format!(
                    "{} does not declare {}.{}",
                    def.name, interface.name, required.name
                ));
            }
        }
    }
    Ok(())
}

/// Validate the target's explicit interfaces.
pub(crate) fn check_target_interfaces(
    universe: &TypeUniverse,
    target: &TypeDef,
) -> Result<(), CompositionError> {
    for name in &target.interfaces {
        let interface = lookup(universe, &target.name, name)?;
        check_implements(target, &interface)
            .map_err(|message| CompositionError::configuration(&target.name, message))?;
    }
    Ok(())
}

/// Interfaces introduced by mixins, in mixin order.
///
/// An interface the target already implements is not introduced; the
/// target's implementation wins. Two mixins introducing the same interface
/// is ambiguous and rejected.
pub(crate) fn received_interfaces(
    universe: &TypeUniverse,
    target: &TypeDef,
    mixins: &[MixinConfiguration],
) -> Result<Vec<ReceivedInterface>, CompositionError> {
    let mut received: Vec<ReceivedInterface> = Vec::new();
    for mixin in mixins {
        for name in &mixin.definition.interfaces {
            let interface = lookup(universe, &target.name, name)?;
            check_implements(&mixin.definition, &interface)
                .map_err(|message| CompositionError::configuration(&target.name, message))?;
            if target.interfaces.contains(name) {
                continue;
            }
            if let Some(previous) = received.iter().find(|r| &r.interface == name) {
                return Err(CompositionError::configuration(
                    &target.name,
                    format!(
                        "interface {name} is introduced by both {} and {}",
                        mixins[previous.mixin_index].name(),
                        mixin.name()
                    ),
                ));
            }
            received.push(ReceivedInterface {
                interface: name.clone(),
                mixin_index: mixin.mixin_index,
                visibility: mixin.introduced_visibility,
            });
        }
    }
    Ok(received)
}

/// Resolve every face and base-call requirement of the configuration.
pub(crate) fn satisfy(
    universe: &TypeUniverse,
    target: &TypeDef,
    requested: &[TypeName],
    mixins: &[MixinConfiguration],
    received: &[ReceivedInterface],
) -> Result<RequirementSatisfactionMap, CompositionError> {
    let mut wanted: BTreeMap<TypeName, Vec<Requester>> = BTreeMap::new();
    for name in requested {
        wanted
            .entry(name.clone())
            .or_default()
            .push(Requester::Configuration);
    }
    for mixin in mixins {
        for name in &mixin.definition.this_requirements {
            wanted
                .entry(name.clone())
                .or_default()
                .push(Requester::Mixin(mixin.mixin_index));
        }
    }

    let mut faces = Vec::with_capacity(wanted.len());
    for (name, requested_by) in wanted {
        let interface = lookup(universe, &target.name, &name)?;
        let mut methods = BTreeMap::new();
        for required in &interface.methods {
            let implementation = resolve_face_method(target, &interface, received, mixins, required)
                .ok_or_else(|| {
                    CompositionError::configuration(
                        &target.name,
                        format!(
                            "required interface {name} is not satisfied: no implementation of {} {}",
                            required.name, required.signature
                        ),
                    )
                })?;
            methods.insert(required.name.clone(), implementation);
        }
        faces.push(RequiredFaceType {
            interface: name,
            requested_by,
            methods,
        });
    }

    let mut base_calls = Vec::new();
    for mixin in mixins {
        for name in &mixin.definition.base_requirements {
            let interface = lookup(universe, &target.name, name)?;
            let mut methods = BTreeMap::new();
            for required in &interface.methods {
                let resolved =
                    resolve_base_call_method(target, &interface, received, mixins, mixin, required)
                        .ok_or_else(|| {
                            CompositionError::configuration(
                                &target.name,
                                format!(
                                    "base-call interface {name} required by {} is not satisfied: \
                                     nothing after it implements {} {}",
                                    mixin.name(),
                                    required.name,
                                    required.signature
                                ),
                            )
                        })?;
                methods.insert(required.name.clone(), resolved);
            }
            base_calls.push(RequiredBaseCallType {
                interface: name.clone(),
                mixin_index: mixin.mixin_index,
                methods,
            });
        }
    }

    Ok(RequirementSatisfactionMap { faces, base_calls })
}

fn resolve_face_method(
    target: &TypeDef,
    interface: &InterfaceDef,
    received: &[ReceivedInterface],
    mixins: &[MixinConfiguration],
    required: &InterfaceMethod,
) -> Option<RequiredImplementation> {
    if target.interfaces.contains(&interface.name) {
        return Some(RequiredImplementation::Target {
            method: required.name.clone(),
        });
    }
    if let Some(by) = received.iter().find(|r| r.interface == interface.name) {
        let mixin = &mixins[by.mixin_index];
        return mixin
            .definition
            .find_method(&required.name)
            .map(|method| RequiredImplementation::Mixin {
                index: mixin.mixin_index,
                method: method.name.clone(),
            });
    }
    // Duck matching only ever looks at members declared on the target.
    target
        .find_method(&required.name)
        .filter(|method| method.signature == required.signature)
        .filter(|method| method.visibility == Visibility::Public)
        .map(|method| RequiredImplementation::Duck {
            method: method.name.clone(),
        })
}

fn resolve_base_call_method(
    target: &TypeDef,
    interface: &InterfaceDef,
    received: &[ReceivedInterface],
    mixins: &[MixinConfiguration],
    requester: &MixinConfiguration,
    required: &InterfaceMethod,
) -> Option<BaseCallTarget> {
    if target
        .find_method(&required.name)
        .is_some_and(|method| method.signature == required.signature)
    {
        return Some(BaseCallTarget::Chain {
            member: required.name.clone(),
        });
    }
    received
        .iter()
        .filter(|r| r.interface == interface.name && r.mixin_index > requester.mixin_index)
        .find_map(|r| {
            mixins[r.mixin_index]
                .definition
                .find_method(&required.name)
                .map(|method| BaseCallTarget::Mixin {
                    index: r.mixin_index,
                    method: method.name.clone(),
                })
        })
}
