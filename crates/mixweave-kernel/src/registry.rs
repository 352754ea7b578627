//! Process-wide caches of configurations and composed shapes.
//!
//! The registry is safe to share across threads. Lookups of cached entries
//! take a read lock only. Synthesis of a missing shape runs under a lock
//! private to its descriptor, so each key is synthesized at most once while
//! different keys synthesize in parallel.

use crate::configuration::{ClassConfiguration, CompositionRequest, ConfigurationDescriptor};
use crate::error::CompositionError;
use crate::initializer;
use crate::instance::{ComposedInstance, InitMode, MixinObject};
use crate::model::TypeUniverse;
use crate::shape::{ComposedShape, ShapeBuilder, TableShapeBuilder};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

type ShapeCell = Arc<Mutex<Option<Arc<ComposedShape>>>>;

pub struct CompositionRegistry {
    universe: Arc<TypeUniverse>,
    builder: Box<dyn ShapeBuilder>,
    configurations: RwLock<HashMap<ConfigurationDescriptor, Arc<ClassConfiguration>>>,
    shapes: RwLock<HashMap<ConfigurationDescriptor, Arc<ComposedShape>>>,
    /// One cell per descriptor being (or having been) synthesized.
    in_flight: Mutex<HashMap<ConfigurationDescriptor, ShapeCell>>,
    syntheses: AtomicUsize,
}

impl CompositionRegistry {
    pub fn new(universe: Arc<TypeUniverse>) -> Self {
        Self::with_builder(universe, Box::new(TableShapeBuilder))
    }

    pub fn with_builder(universe: Arc<TypeUniverse>, builder: Box<dyn ShapeBuilder>) -> Self {
        Self {
            universe,
            builder,
            configurations: RwLock::new(HashMap::new()),
            shapes: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            syntheses: AtomicUsize::new(0),
        }
    }

    pub fn universe(&self) -> &Arc<TypeUniverse> {
        &self.universe
    }

    /// The configuration for a request, built once per descriptor.
    pub fn configuration(
        &self,
        request: &CompositionRequest,
    ) -> Result<Arc<ClassConfiguration>, CompositionError> {
        self.configuration_for(request.normalize()?)
    }

    pub fn configuration_for(
        &self,
        descriptor: ConfigurationDescriptor,
    ) -> Result<Arc<ClassConfiguration>, CompositionError> {
        if let Some(configuration) = self.configurations.read().get(&descriptor) {
            return Ok(configuration.clone());
        }
        let built = Arc::new(ClassConfiguration::from_descriptor(
            &self.universe,
            descriptor.clone(),
        )?);
        // A racing builder may have won; keep whichever landed first.
        let mut configurations = self.configurations.write();
        let configuration = configurations.entry(descriptor).or_insert(built);
        Ok(configuration.clone())
    }

    /// The composed shape for a request.
    pub fn shape_for(
        &self,
        request: &CompositionRequest,
    ) -> Result<Arc<ComposedShape>, CompositionError> {
        self.shape_for_descriptor(request.normalize()?)
    }

    pub fn shape_for_descriptor(
        &self,
        descriptor: ConfigurationDescriptor,
    ) -> Result<Arc<ComposedShape>, CompositionError> {
        if let Some(shape) = self.shapes.read().get(&descriptor) {
            trace!(class = %descriptor.target, "shape cache hit");
            return Ok(shape.clone());
        }

        let cell = self
            .in_flight
            .lock()
            .entry(descriptor.clone())
            .or_default()
            .clone();
        let mut slot = cell.lock();
        if let Some(shape) = slot.as_ref() {
            return Ok(shape.clone());
        }

        let configuration = self.configuration_for(descriptor.clone())?;
        debug!(
            class = %descriptor.target,
            key = configuration.key().short(),
            mixins = configuration.mixin_count(),
            "synthesizing composed shape"
        );
        let shape = Arc::new(self.builder.build(configuration)?);
        self.syntheses.fetch_add(1, Ordering::Relaxed);
        *slot = Some(shape.clone());
        self.shapes.write().insert(descriptor, shape.clone());
        Ok(shape)
    }

    /// Allocate and initialize a composed instance.
    ///
    /// `supplied` mixin objects fill their slots; the rest are instantiated.
    pub fn create_instance(
        &self,
        request: &CompositionRequest,
        supplied: Vec<MixinObject>,
    ) -> Result<ComposedInstance, CompositionError> {
        let shape = self.shape_for(request)?;
        let mut instance = ComposedInstance::allocate(shape);
        initializer::initialize(&mut instance, supplied, InitMode::Construction)?;
        Ok(instance)
    }

    /// Number of shapes synthesized since creation (or the last `clear`).
    pub fn synthesis_count(&self) -> usize {
        self.syntheses.load(Ordering::Relaxed)
    }

    pub fn cached_shapes(&self) -> usize {
        self.shapes.read().len()
    }

    /// Drop every cached configuration and shape.
    ///
    /// Shapes already handed out stay valid; later lookups synthesize anew.
    pub fn clear(&self) {
        let mut in_flight = self.in_flight.lock();
        self.shapes.write().clear();
        self.configurations.write().clear();
        in_flight.clear();
        self.syntheses.store(0, Ordering::Relaxed);
        debug!("composition caches cleared");
    }
}
