//! # Mixweave Kernel
//!
//! Mixin composition for a runtime that has no native mixins: a target
//! class plus an ordered list of mixins becomes one composed entity whose
//! members dispatch through override chains, introduced interfaces and
//! base-call proxies.
//!
//! The kernel is **runtime-model agnostic**: types are data
//! (`TypeUniverse`), member bodies are closures, field state is flat JSON.
//! Every dispatch decision is made once, when a shape is synthesized.
//!
//! ## Architecture
//!
//! ```text
//! TypeUniverse             ← Classes, mixins, value types, interfaces
//!     │
//! CompositionRequest       ← Target + mixins + required interfaces
//!     │ normalize
//! ConfigurationDescriptor  ← Structural identity, cache key
//!     │ build
//! ClassConfiguration       ← Member tables, overrides, requirements
//!     │ ShapeBuilder
//! ComposedShape            ← Chain tables, forwards, wrappers, layout
//!     │ allocate + initialize
//! ComposedInstance         ← Target fields + mixin objects + proxies
//! ```
//!
//! `CompositionRegistry` caches the middle of this pipeline per descriptor
//! and is safe to share across threads.

pub mod configuration;
pub mod error;
pub mod initializer;
pub mod instance;
pub mod invocation;
pub mod key;
pub mod model;
pub mod proxy;
pub mod registry;
pub mod requirements;
pub mod resolver;
pub mod shape;
pub mod toy;

pub use configuration::{
    ClassConfiguration, CompositionRequest, ConfigurationDescriptor, IntroducedVisibility,
    MixinConfiguration, MixinRequest,
};
pub use error::{CompositionError, DispatchError};
pub use initializer::initialize;
pub use instance::{ComposedInstance, InitMode, InitState, MixinObject, RuntimeType, Slot};
pub use invocation::Invocation;
pub use key::ConfigurationKey;
pub use model::{
    FieldState, HookKind, InterfaceDef, MethodDecl, Signature, TypeDef, TypeKind, TypeName,
    TypeUniverse, Visibility,
};
pub use proxy::BaseCallProxy;
pub use registry::CompositionRegistry;
pub use requirements::RequirementSatisfactionMap;
pub use resolver::{Implementation, next_in_chain};
pub use shape::{ComposedShape, Forward, ShapeBuilder, TableShapeBuilder};
