//! Composed shape synthesis.
//!
//! A `ComposedShape` is the "generated type" of a configuration: every
//! dispatch decision a composed instance will ever make, computed once.
//!
//! - one chain table per target member (`mixin_count + 1` entries),
//! - forwards for interface methods satisfied by the target, by mixins, or
//!   by duck matching,
//! - the plain-name public surface (target members plus publicly
//!   introduced mixin members),
//! - one `MixinWrapper` per mixin listing the non-public members the
//!   composition may call on it,
//! - the field layout of the target and each mixin.
//!
//! Shapes are produced by a `ShapeBuilder`. The registry memoizes them per
//! configuration.

use crate::configuration::{ClassConfiguration, IntroducedVisibility};
use crate::error::{CompositionError, DispatchError};
use crate::instance::{MixinObject, RuntimeType};
use crate::model::{OverrideDecl, TypeName, Visibility};
use crate::requirements::{BaseCallTarget, RequiredImplementation};
use crate::resolver::{Implementation, chain_table};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// How a call reaches its implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Forward {
    /// Enter the override chain of a target member at `depth`.
    Chain { member: String, depth: usize },
    /// Call a mixin member on the mixin instance. A non-public member is
    /// reachable only if the mixin's wrapper lists it.
    Mixin { index: usize, method: String },
    /// The mixin member is overridden by the target; run the target's
    /// overrider, whose `proceed` reaches the mixin's original.
    OverriddenMixin {
        index: usize,
        method: String,
        overrider: String,
    },
}

/// Privileged access table for one mixin.
///
/// Pairs the mixin slot with the non-public members the composition is
/// allowed to invoke on it. Calls that would reach a non-public mixin member
/// without an entry here are refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixinWrapper {
    pub mixin_index: usize,
    pub mixin: TypeName,
    pub runtime_type: RuntimeType,
    wrappers: BTreeMap<String, Visibility>,
}

impl MixinWrapper {
    pub fn public_wrapper(&self, method: &str) -> Option<Visibility> {
        self.wrappers.get(method).copied()
    }

    pub fn wrapped_members(&self) -> impl Iterator<Item = &str> {
        self.wrappers.keys().map(String::as_str)
    }
}

/// Field names per slot, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldLayout {
    pub target: Vec<String>,
    pub mixins: Vec<Vec<String>>,
}

/// The synthesized, immutable dispatch model of one configuration.
#[derive(Debug)]
pub struct ComposedShape {
    configuration: Arc<ClassConfiguration>,
    chains: BTreeMap<String, Vec<Implementation>>,
    base_forwards: BTreeMap<String, Vec<Option<Forward>>>,
    interface_forwards: BTreeMap<(TypeName, String), Forward>,
    surface: BTreeMap<String, Forward>,
    wrappers: Vec<MixinWrapper>,
    layout: FieldLayout,
}

/// Produces shapes from configurations.
///
/// Implementations must be safe to share across threads; a builder with
/// internal mutable state synchronizes it itself.
pub trait ShapeBuilder: Send + Sync {
    fn build(&self, configuration: Arc<ClassConfiguration>)
    -> Result<ComposedShape, CompositionError>;
}

/// Default builder: table-driven dispatch, no code generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableShapeBuilder;

impl ShapeBuilder for TableShapeBuilder {
    fn build(
        &self,
        configuration: Arc<ClassConfiguration>,
    ) -> Result<ComposedShape, CompositionError> {
        ComposedShape::synthesize(configuration)
    }
}

impl ComposedShape {
    pub fn synthesize(configuration: Arc<ClassConfiguration>) -> Result<Self, CompositionError> {
        let mut synth = Synthesis::new(&configuration);

        let mut chains = BTreeMap::new();
        for member in configuration.methods() {
            let table = chain_table(&configuration, &member.name)?;
            for implementation in &table {
                if let Implementation::Mixin { index, method } = implementation {
                    synth.note_call(*index, method);
                }
            }
            chains.insert(member.name.clone(), table);
        }

        let mut interface_forwards = BTreeMap::new();
        for interface in &configuration.target().interfaces {
            if let Some(def) = synth.interface_methods(interface) {
                for method in def {
                    interface_forwards.insert(
                        (interface.clone(), method.clone()),
                        Forward::Chain {
                            member: method,
                            depth: 0,
                        },
                    );
                }
            }
        }
        for received in configuration.received_interfaces() {
            if let Some(def) = synth.interface_methods(&received.interface) {
                for method in def {
                    let forward = synth.forward_to_mixin(received.mixin_index, &method);
                    interface_forwards.insert((received.interface.clone(), method), forward);
                }
            }
        }
        for face in &configuration.requirements().faces {
            for (method, implementation) in &face.methods {
                let forward = match implementation {
                    RequiredImplementation::Target { method }
                    | RequiredImplementation::Duck { method } => Forward::Chain {
                        member: method.clone(),
                        depth: 0,
                    },
                    RequiredImplementation::Mixin { index, method } => {
                        synth.forward_to_mixin(*index, method)
                    }
                };
                interface_forwards.insert((face.interface.clone(), method.clone()), forward);
            }
        }

        let mut surface = BTreeMap::new();
        for member in configuration.methods() {
            if member.visibility.is_public() {
                surface.insert(
                    member.name.clone(),
                    Forward::Chain {
                        member: member.name.clone(),
                        depth: 0,
                    },
                );
            }
        }
        for received in configuration.received_interfaces() {
            if received.visibility != IntroducedVisibility::Public {
                continue;
            }
            if let Some(def) = synth.interface_methods(&received.interface) {
                for method in def {
                    if surface.contains_key(&method)
                        || configuration.target_method(&method).is_some()
                    {
                        continue;
                    }
                    let forward = synth.forward_to_mixin(received.mixin_index, &method);
                    surface.insert(method, forward);
                }
            }
        }

        let base_forwards = synth.base_forwards();

        let layout = FieldLayout {
            target: field_names(configuration.target()),
            mixins: configuration
                .mixins()
                .iter()
                .map(|m| field_names(&m.definition))
                .collect(),
        };

        let wrappers = synth.finish();
        tracing::debug!(
            class = %configuration.target_name(),
            key = configuration.key().short(),
            chains = chains.len(),
            forwards = interface_forwards.len(),
            "synthesized composed shape"
        );
        Ok(Self {
            configuration,
            chains,
            base_forwards,
            interface_forwards,
            surface,
            wrappers,
            layout,
        })
    }

    pub fn configuration(&self) -> &Arc<ClassConfiguration> {
        &self.configuration
    }

    pub fn mixin_count(&self) -> usize {
        self.configuration.mixin_count()
    }

    /// Unrolled chain of a target member.
    pub fn chain(&self, member: &str) -> Option<&[Implementation]> {
        self.chains.get(member).map(Vec::as_slice)
    }

    /// Statically resolved implementation of `member` at `depth`, or `None`
    /// when `member` is not a target member.
    pub fn dispatch_target(
        &self,
        member: &str,
        depth: usize,
    ) -> Result<Option<&Implementation>, DispatchError> {
        self.check_depth(depth)?;
        Ok(self.chains.get(member).and_then(|table| table.get(depth)))
    }

    /// Forward for a non-target member called through a base-call proxy.
    ///
    /// The requesting mixin's declared base-call interfaces take precedence,
    /// then any interface introduced by a mixin at or past `depth`.
    pub fn base_forward(&self, member: &str, depth: usize) -> Result<Option<Forward>, DispatchError> {
        self.check_depth(depth)?;
        if let Some(requester) = depth.checked_sub(1) {
            let declared = self
                .configuration
                .requirements()
                .base_calls_of(requester)
                .find_map(|req| req.methods.get(member));
            if let Some(BaseCallTarget::Mixin { index, method }) = declared {
                return Ok(Some(self.mixin_forward(*index, method)));
            }
        }
        Ok(self
            .base_forwards
            .get(member)
            .and_then(|table| table.get(depth))
            .cloned()
            .flatten())
    }

    pub fn surface_forward(&self, name: &str) -> Option<&Forward> {
        self.surface.get(name)
    }

    pub fn interface_forward(&self, interface: &TypeName, method: &str) -> Option<&Forward> {
        self.interface_forwards
            .get(&(interface.clone(), method.to_string()))
    }

    /// Every interface the composed entity answers to.
    pub fn interfaces(&self) -> Vec<&TypeName> {
        let mut names: Vec<&TypeName> = self.interface_forwards.keys().map(|(i, _)| i).collect();
        names.dedup();
        names
    }

    pub fn wrapper(&self, index: usize) -> Option<&MixinWrapper> {
        self.wrappers.get(index)
    }

    pub fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    /// Runtime type a mixin instance must carry to fill slot `index`.
    pub fn mixin_runtime_type(&self, index: usize) -> Option<&RuntimeType> {
        self.wrappers.get(index).map(|w| &w.runtime_type)
    }

    /// A default-initialized mixin object of the right runtime type, for
    /// callers that want to pre-build mixins before instantiation.
    pub fn new_mixin_object(&self, index: usize) -> Option<MixinObject> {
        let mixin = self.configuration.mixin(index)?;
        let runtime_type = self.mixin_runtime_type(index)?.clone();
        Some(MixinObject::new(
            runtime_type,
            mixin.definition.default_fields(),
        ))
    }

    fn check_depth(&self, depth: usize) -> Result<(), DispatchError> {
        let mixin_count = self.mixin_count();
        if depth > mixin_count {
            return Err(DispatchError::InvalidDepth { depth, mixin_count });
        }
        Ok(())
    }

    fn mixin_forward(&self, index: usize, method: &str) -> Forward {
        mixin_forward(&self.configuration, index, method)
    }
}

fn field_names(def: &crate::model::TypeDef) -> Vec<String> {
    def.fields.iter().map(|f| f.name.clone()).collect()
}

fn mixin_forward(configuration: &ClassConfiguration, index: usize, method: &str) -> Forward {
    let member = configuration.mixin(index).and_then(|m| m.method(method));
    match member.and_then(|m| m.target_overrider()) {
        Some(overrider) => Forward::OverriddenMixin {
            index,
            method: method.to_string(),
            overrider: overrider.to_string(),
        },
        None => Forward::Mixin {
            index,
            method: method.to_string(),
        },
    }
}

/// Working state of one synthesis pass.
struct Synthesis<'c> {
    configuration: &'c ClassConfiguration,
    wrapped: Vec<BTreeMap<String, Visibility>>,
}

impl<'c> Synthesis<'c> {
    fn new(configuration: &'c ClassConfiguration) -> Self {
        let mut synth = Self {
            configuration,
            wrapped: vec![BTreeMap::new(); configuration.mixin_count()],
        };
        // Originals reached through `proceed` from a target overrider.
        for decl in &configuration.target().methods {
            if let Some(OverrideDecl::Mixin(mixin)) = &decl.overrides
                && let Some(index) = configuration.mixin_index_of(mixin)
            {
                synth.note_call(index, &decl.name);
            }
        }
        synth
    }

    /// Record that the composition calls `method` on mixin `index`.
    fn note_call(&mut self, index: usize, method: &str) {
        let Some(member) = self
            .configuration
            .mixin(index)
            .and_then(|m| m.method(method))
        else {
            return;
        };
        if !member.visibility.is_public() {
            self.wrapped[index].insert(member.name.clone(), member.visibility);
        }
    }

    fn forward_to_mixin(&mut self, index: usize, method: &str) -> Forward {
        self.note_call(index, method);
        mixin_forward(self.configuration, index, method)
    }

    fn interface_methods(&self, interface: &TypeName) -> Option<Vec<String>> {
        self.configuration
            .interface(interface)
            .map(|def| def.methods.iter().map(|m| m.name.clone()).collect())
    }

    /// Per-depth table for every method of every received interface.
    fn base_forwards(&mut self) -> BTreeMap<String, Vec<Option<Forward>>> {
        let mixin_count = self.configuration.mixin_count();
        let mut tables: BTreeMap<String, Vec<Option<Forward>>> = BTreeMap::new();
        let received = self.configuration.received_interfaces().to_vec();
        for entry in &received {
            let Some(methods) = self.interface_methods(&entry.interface) else {
                continue;
            };
            for method in methods {
                if self.configuration.target_method(&method).is_some() {
                    continue;
                }
                let table = tables
                    .entry(method.clone())
                    .or_insert_with(|| vec![None; mixin_count + 1]);
                let forward = self.forward_to_mixin(entry.mixin_index, &method);
                for slot in table.iter_mut().take(entry.mixin_index + 1) {
                    if slot.is_none() {
                        *slot = Some(forward.clone());
                    }
                }
            }
        }
        tables
    }

    fn finish(self) -> Vec<MixinWrapper> {
        let key = self.configuration.key();
        self.configuration
            .mixins()
            .iter()
            .zip(self.wrapped)
            .map(|(mixin, wrappers)| MixinWrapper {
                mixin_index: mixin.mixin_index,
                mixin: mixin.name().clone(),
                runtime_type: if mixin.needs_derived_mixin_type {
                    RuntimeType::Derived {
                        mixin: mixin.name().clone(),
                        configuration: key.clone(),
                    }
                } else {
                    RuntimeType::Declared {
                        name: mixin.name().clone(),
                    }
                },
                wrappers,
            })
            .collect()
    }
}
