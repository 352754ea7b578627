//! Capture and reconstruction of composed instances.
//!
//! Reconstruction runs bottom-up, in a fixed order:
//!
//! 1. check the record header and key,
//! 2. look up (or synthesize) the shape for the recorded descriptor,
//! 3. allocate, then assign mixin objects of the recorded types,
//! 4. run `Deserializing` hooks (target, then mixins in order),
//! 5. populate target and mixin fields from the record,
//! 6. run `Deserialized` hooks,
//! 7. complete initialization (`Initialized` hooks, proxies),
//! 8. run `DeserializationCallback` hooks.
//!
//! Hooks in steps 4 and 6 run before the instance accepts calls.

use crate::error::SurrogateError;
use crate::record::{FlatRecord, MixinRecord, RECORD_KIND, RECORD_SCHEMA};
use mixweave_kernel::initializer;
use mixweave_kernel::shape::FieldLayout;
use mixweave_kernel::{
    ComposedInstance, CompositionRegistry, FieldState, HookKind, InitMode, InitState, Slot,
    TypeName,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub trait Surrogate: Send + Sync {
    fn capture(&self, instance: &ComposedInstance) -> Result<FlatRecord, SurrogateError>;

    fn reconstruct(
        &self,
        registry: &CompositionRegistry,
        record: &FlatRecord,
    ) -> Result<ComposedInstance, SurrogateError>;
}

/// Captures every declared field of every slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatSurrogate;

impl Surrogate for FlatSurrogate {
    fn capture(&self, instance: &ComposedInstance) -> Result<FlatRecord, SurrogateError> {
        if instance.state() != InitState::Initialized {
            return Err(mixweave_kernel::DispatchError::NotInitialized.into());
        }
        let configuration = instance.configuration();
        let mixins = configuration
            .mixins()
            .iter()
            .zip(instance.extensions())
            .map(|(mixin, object)| MixinRecord {
                mixin_type: mixin.name().clone(),
                fields: object.fields(),
            })
            .collect();
        Ok(FlatRecord {
            schema: RECORD_SCHEMA,
            record_kind: RECORD_KIND.to_string(),
            configuration: configuration.descriptor().clone(),
            configuration_key: configuration.key().clone(),
            target_fields: instance.target_fields(),
            mixins,
        })
    }

    fn reconstruct(
        &self,
        registry: &CompositionRegistry,
        record: &FlatRecord,
    ) -> Result<ComposedInstance, SurrogateError> {
        record.check_header()?;
        let shape = registry.shape_for_descriptor(record.configuration.clone())?;
        let configuration = shape.configuration().clone();

        if record.mixins.len() != configuration.mixin_count() {
            return Err(SurrogateError::corrupt(format!(
                "record has {} mixins, configuration has {}",
                record.mixins.len(),
                configuration.mixin_count()
            )));
        }
        let layout = shape.layout();
        check_fields("target", &layout.target, &record.target_fields)?;
        let mut supplied = Vec::with_capacity(record.mixins.len());
        for (index, (mixin, recorded)) in configuration.mixins().iter().zip(&record.mixins).enumerate() {
            if &recorded.mixin_type != mixin.name() {
                return Err(SurrogateError::corrupt(format!(
                    "mixin {index} is recorded as {}, configuration has {}",
                    recorded.mixin_type,
                    mixin.name()
                )));
            }
            check_fields(mixin.name().as_str(), &mixin_layout(layout, index), &recorded.fields)?;
            let object = shape.new_mixin_object(index).ok_or_else(|| {
                SurrogateError::corrupt(format!("configuration has no mixin slot {index}"))
            })?;
            supplied.push(object);
        }

        let mut instance = ComposedInstance::allocate(shape.clone());
        initializer::assign_mixins(&mut instance, supplied, InitMode::Deserialization)?;
        run_hooks(&instance, HookKind::Deserializing)?;

        let target = merged(instance.target_fields(), &record.target_fields);
        instance.replace_fields(Slot::Target, target)?;
        for (index, recorded) in record.mixins.iter().enumerate() {
            let defaults = instance.mixin(index).map(|object| object.fields()).unwrap_or_default();
            instance.replace_fields(Slot::Mixin(index), merged(defaults, &recorded.fields))?;
        }

        run_hooks(&instance, HookKind::Deserialized)?;
        initializer::complete(&mut instance)?;
        run_hooks(&instance, HookKind::DeserializationCallback)?;
        debug!(
            class = %configuration.target_name(),
            key = configuration.key().short(),
            "reconstructed composed instance"
        );
        Ok(instance)
    }
}

fn mixin_layout(layout: &FieldLayout, index: usize) -> Vec<String> {
    layout.mixins.get(index).cloned().unwrap_or_default()
}

fn check_fields(owner: &str, declared: &[String], recorded: &FieldState) -> Result<(), SurrogateError> {
    if let Some(unknown) = recorded.keys().find(|name| !declared.contains(*name)) {
        return Err(SurrogateError::corrupt(format!(
            "{owner} declares no field `{unknown}`"
        )));
    }
    Ok(())
}

/// Recorded values over declared defaults; fields missing from the record
/// keep their defaults.
fn merged(mut defaults: FieldState, recorded: &FieldState) -> FieldState {
    for (name, value) in recorded {
        defaults.insert(name.clone(), value.clone());
    }
    defaults
}

fn run_hooks(instance: &ComposedInstance, kind: HookKind) -> Result<(), SurrogateError> {
    instance.run_hook(Slot::Target, kind)?;
    for index in 0..instance.extensions().len() {
        instance.run_hook(Slot::Mixin(index), kind)?;
    }
    Ok(())
}

/// Surrogates by target type, with `FlatSurrogate` as the fallback.
pub struct SurrogateRegistry {
    fallback: Arc<dyn Surrogate>,
    by_target: RwLock<HashMap<TypeName, Arc<dyn Surrogate>>>,
}

impl Default for SurrogateRegistry {
    fn default() -> Self {
        Self::new(Arc::new(FlatSurrogate))
    }
}

impl SurrogateRegistry {
    pub fn new(fallback: Arc<dyn Surrogate>) -> Self {
        Self {
            fallback,
            by_target: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, target: impl Into<String>, surrogate: Arc<dyn Surrogate>) {
        self.by_target.write().insert(TypeName::new(target), surrogate);
    }

    pub fn surrogate_for(&self, target: &TypeName) -> Arc<dyn Surrogate> {
        self.by_target
            .read()
            .get(target)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    pub fn capture(&self, instance: &ComposedInstance) -> Result<FlatRecord, SurrogateError> {
        self.surrogate_for(instance.configuration().target_name())
            .capture(instance)
    }

    pub fn reconstruct(
        &self,
        registry: &CompositionRegistry,
        record: &FlatRecord,
    ) -> Result<ComposedInstance, SurrogateError> {
        self.surrogate_for(&record.configuration.target)
            .reconstruct(registry, record)
    }

    pub fn save(&self, instance: &ComposedInstance) -> Result<String, SurrogateError> {
        self.capture(instance)?.to_json()
    }

    pub fn load(
        &self,
        registry: &CompositionRegistry,
        text: &str,
    ) -> Result<ComposedInstance, SurrogateError> {
        let record = FlatRecord::from_json(text)?;
        self.reconstruct(registry, &record)
    }
}
