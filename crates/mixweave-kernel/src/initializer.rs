//! Instance initialization.
//!
//! Initialization is split in two so reconstruction can interleave its own
//! steps:
//!
//! 1. `assign_mixins`: validate supplied mixin objects, instantiate the
//!    missing ones. All or nothing: on error the instance is unchanged.
//! 2. `complete`: attach the depth-0 proxy, hand every mixin with an
//!    initialization hook its own proxy, mark the instance initialized.
//!
//! `initialize` runs whichever steps are still pending and is a no-op on an
//! initialized instance. If an initialization hook fails, the instance goes
//! back to `MixinsAssigned`; a later `initialize` or `complete` retries the
//! hooks from the first mixin.

use crate::error::CompositionError;
use crate::instance::{ComposedInstance, InitMode, InitState, MixinObject, Slot};
use crate::model::HookKind;
use crate::shape::ComposedShape;

/// Initialize a freshly allocated instance.
pub fn initialize(
    instance: &mut ComposedInstance,
    supplied: Vec<MixinObject>,
    mode: InitMode,
) -> Result<(), CompositionError> {
    if instance.state == InitState::Initialized {
        tracing::trace!("initialization skipped; instance already initialized");
        return Ok(());
    }
    assign_mixins(instance, supplied, mode)?;
    complete(instance)
}

/// Fill every mixin slot, from `supplied` where a matching object was given.
pub fn assign_mixins(
    instance: &mut ComposedInstance,
    supplied: Vec<MixinObject>,
    mode: InitMode,
) -> Result<(), CompositionError> {
    if instance.state != InitState::Uninitialized {
        return Ok(());
    }
    let shape = instance.shape().clone();
    let configuration = shape.configuration();
    let mut slots: Vec<Option<MixinObject>> = Vec::new();
    slots.resize_with(configuration.mixin_count(), || None);

    for object in supplied {
        let runtime_type = object.runtime_type();
        let Some(index) = configuration.mixin_index_of(runtime_type.mixin_type()) else {
            return Err(CompositionError::InvalidMixinInstance {
                runtime_type: runtime_type.to_string(),
                message: format!(
                    "no mixin of this type is configured for {}",
                    configuration.target_name()
                ),
            });
        };
        let expected = shape.mixin_runtime_type(index);
        if expected != Some(runtime_type) {
            let message = match expected {
                Some(expected) => format!("slot {index} requires runtime type {expected}"),
                None => format!("slot {index} does not exist"),
            };
            return Err(CompositionError::InvalidMixinInstance {
                runtime_type: runtime_type.to_string(),
                message,
            });
        }
        let declared = &shape.layout().mixins[index];
        if let Some(extra) = object.fields().keys().find(|name| !declared.contains(*name)) {
            return Err(CompositionError::InvalidMixinInstance {
                runtime_type: runtime_type.to_string(),
                message: format!("declares no field `{extra}`"),
            });
        }
        if slots[index].is_some() {
            return Err(CompositionError::InvalidMixinInstance {
                runtime_type: runtime_type.to_string(),
                message: "supplied more than once".into(),
            });
        }
        slots[index] = Some(object);
    }

    let mut extensions = Vec::with_capacity(slots.len());
    for (index, slot) in slots.into_iter().enumerate() {
        let object = match slot {
            Some(object) => object,
            None => instantiate(&shape, index)?,
        };
        extensions.push(object);
    }

    instance.extensions = extensions;
    instance.mode = mode;
    instance.state = InitState::MixinsAssigned;
    Ok(())
}

/// Run initialization hooks and mark the instance initialized.
pub fn complete(instance: &mut ComposedInstance) -> Result<(), CompositionError> {
    if instance.state != InitState::MixinsAssigned {
        return Ok(());
    }
    // Hooks may call members, which only initialized instances accept.
    instance.state = InitState::Initialized;
    if let Err(err) = run_initialized_hooks(instance) {
        instance.state = InitState::MixinsAssigned;
        instance.detach_proxies();
        tracing::debug!(
            class = %instance.configuration().target_name(),
            error = %err,
            "initialization hook failed"
        );
        return Err(err);
    }
    tracing::trace!(
        class = %instance.configuration().target_name(),
        mode = ?instance.mode,
        "instance initialized"
    );
    Ok(())
}

fn run_initialized_hooks(instance: &ComposedInstance) -> Result<(), CompositionError> {
    instance.first_base_call_proxy()?;
    for index in 0..instance.configuration().mixin_count() {
        let hooked = instance
            .configuration()
            .mixin(index)
            .is_some_and(|m| m.definition.hooks.get(HookKind::Initialized).is_some());
        if hooked {
            instance.base_call_proxy(index + 1)?;
            instance.run_hook(Slot::Mixin(index), HookKind::Initialized)?;
        }
    }
    Ok(())
}

fn instantiate(shape: &ComposedShape, index: usize) -> Result<MixinObject, CompositionError> {
    let mixin = &shape.configuration().mixins()[index];
    let def = &mixin.definition;
    if !def.is_constructible() {
        return Err(CompositionError::MissingConstructor {
            mixin: def.name.clone(),
        });
    }
    shape
        .new_mixin_object(index)
        .ok_or_else(|| CompositionError::MissingConstructor {
            mixin: def.name.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::{ClassConfiguration, CompositionRequest};
    use crate::instance::RuntimeType;
    use crate::model::{MethodDecl, Signature, TypeDef, TypeUniverse};
    use crate::shape::ComposedShape;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn shape(universe: &TypeUniverse, request: CompositionRequest) -> Arc<ComposedShape> {
        let config = ClassConfiguration::build(universe, &request).unwrap();
        Arc::new(ComposedShape::synthesize(Arc::new(config)).unwrap())
    }

    fn universe() -> TypeUniverse {
        TypeUniverse::new()
            .with_type(TypeDef::class("Order").field("total", json!(0)))
            .and_then(|u| u.with_type(TypeDef::class("Audit").field("entries", json!([]))))
            .and_then(|u| u.with_type(TypeDef::class("Stamp").field("at", Value::Null)))
            .and_then(|u| u.with_type(TypeDef::class("Sealed").without_default_constructor()))
            .and_then(|u| u.with_type(TypeDef::value_type("Counter").field("n", json!(0))))
            .unwrap()
    }

    #[test]
    fn missing_mixins_are_instantiated_with_defaults() {
        let shape = shape(&universe(), CompositionRequest::new("Order").mixin("Audit").mixin("Counter"));
        let mut instance = ComposedInstance::allocate(shape);
        initialize(&mut instance, Vec::new(), InitMode::Construction).unwrap();
        assert_eq!(instance.state(), InitState::Initialized);
        assert_eq!(instance.extensions().len(), 2);
        assert_eq!(instance.mixin(0).unwrap().field("entries"), Some(json!([])));
        assert_eq!(instance.mixin(1).unwrap().field("n"), Some(json!(0)));
        assert_eq!(instance.attached_depths(), [0]);
    }

    #[test]
    fn supplied_mixins_are_used() {
        let shape = shape(&universe(), CompositionRequest::new("Order").mixin("Audit"));
        let mut instance = ComposedInstance::allocate(shape);
        let audit = MixinObject::new(RuntimeType::declared("Audit"), [("entries".to_string(), json!(["x"]))].into());
        initialize(&mut instance, vec![audit], InitMode::Construction).unwrap();
        assert_eq!(instance.mixin(0).unwrap().field("entries"), Some(json!(["x"])));
    }

    #[test]
    fn invalid_supplied_mixin_leaves_instance_unchanged() {
        let shape = shape(&universe(), CompositionRequest::new("Order").mixin("Audit").mixin("Stamp"));
        let mut instance = ComposedInstance::allocate(shape);
        let supplied = vec![
            MixinObject::new(RuntimeType::declared("Audit"), Default::default()),
            MixinObject::new(RuntimeType::declared("Unrelated"), Default::default()),
        ];
        let err = initialize(&mut instance, supplied, InitMode::Construction).unwrap_err();
        assert_eq!(err.failure_class(), "invalid_mixin_instance");
        assert_eq!(instance.state(), InitState::Uninitialized);
        assert!(instance.extensions().is_empty());
    }

    #[test]
    fn duplicate_supplied_mixin_is_rejected() {
        let shape = shape(&universe(), CompositionRequest::new("Order").mixin("Audit"));
        let mut instance = ComposedInstance::allocate(shape);
        let supplied = vec![
            MixinObject::new(RuntimeType::declared("Audit"), Default::default()),
            MixinObject::new(RuntimeType::declared("Audit"), Default::default()),
        ];
        let err = initialize(&mut instance, supplied, InitMode::Construction).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn mixin_without_default_constructor_must_be_supplied() {
        let shape = shape(&universe(), CompositionRequest::new("Order").mixin("Sealed"));
        let mut instance = ComposedInstance::allocate(shape.clone());
        let err = initialize(&mut instance, Vec::new(), InitMode::Construction).unwrap_err();
        assert_eq!(err, CompositionError::MissingConstructor { mixin: "Sealed".into() });

        let mut instance = ComposedInstance::allocate(shape);
        let sealed = MixinObject::new(RuntimeType::declared("Sealed"), Default::default());
        initialize(&mut instance, vec![sealed], InitMode::Construction).unwrap();
        assert_eq!(instance.state(), InitState::Initialized);
    }

    #[test]
    fn derived_slot_rejects_declared_instance() {
        let universe = TypeUniverse::new()
            .with_type(TypeDef::class("Order").method(
                MethodDecl::new("flush", Signature::unit(), |_, _| Ok(Value::Null))
                    .overrides_mixin("Cache"),
            ))
            .and_then(|u| {
                u.with_type(TypeDef::class("Cache").method(
                    MethodDecl::new("flush", Signature::unit(), |_, _| Ok(Value::Null)).overridable(),
                ))
            })
            .unwrap();
        let shape = shape(&universe, CompositionRequest::new("Order").mixin("Cache"));
        let mut instance = ComposedInstance::allocate(shape.clone());
        let declared = MixinObject::new(RuntimeType::declared("Cache"), Default::default());
        let err = initialize(&mut instance, vec![declared], InitMode::Construction).unwrap_err();
        assert_eq!(err.failure_class(), "invalid_mixin_instance");

        let derived = shape.new_mixin_object(0).unwrap();
        assert!(derived.runtime_type().is_derived());
        initialize(&mut instance, vec![derived], InitMode::Construction).unwrap();
        assert_eq!(instance.state(), InitState::Initialized);
    }

    #[test]
    fn initialization_is_idempotent() {
        let shape = shape(&universe(), CompositionRequest::new("Order").mixin("Audit"));
        let mut instance = ComposedInstance::allocate(shape);
        initialize(&mut instance, Vec::new(), InitMode::Construction).unwrap();
        instance.mixin(0).unwrap().set_field("entries", json!(["kept"]));
        initialize(&mut instance, Vec::new(), InitMode::Deserialization).unwrap();
        assert_eq!(instance.mode(), InitMode::Construction);
        assert_eq!(instance.mixin(0).unwrap().field("entries"), Some(json!(["kept"])));
    }
}
