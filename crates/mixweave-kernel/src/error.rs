//! Error types for composition and dispatch.
//!
//! Composition errors are raised eagerly, while a configuration is built or
//! an instance is initialized. Dispatch errors are raised by calls on an
//! already composed instance: lookups of names the shape does not expose,
//! visibility violations, and failures reported by member bodies.

use crate::model::TypeName;

pub mod failure_class {
    pub const CONFIGURATION: &str = "configuration_error";
    pub const UNSUPPORTED_COMPOSITION: &str = "unsupported_composition";
    pub const INVALID_MIXIN_INSTANCE: &str = "invalid_mixin_instance";
    pub const MISSING_CONSTRUCTOR: &str = "missing_constructor";
    pub const INVALID_DEPTH: &str = "invalid_depth";
    pub const DISPATCH: &str = "dispatch_error";
}

/// Errors raised while building configurations, synthesizing shapes, or
/// initializing composed instances.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompositionError {
    /// A requirement cannot be satisfied, or the request is malformed.
    #[error("configuration error for {target}: {message}")]
    Configuration { target: TypeName, message: String },

    /// The request asks for an override topology the model does not support.
    #[error("unsupported composition for {target}: {message}")]
    UnsupportedComposition { target: TypeName, message: String },

    /// A caller-supplied mixin instance does not fit any mixin slot.
    #[error("invalid mixin instance of type {runtime_type}: {message}")]
    InvalidMixinInstance {
        runtime_type: String,
        message: String,
    },

    /// A mixin slot could not be auto-instantiated.
    #[error("mixin {mixin} has no usable default constructor")]
    MissingConstructor { mixin: TypeName },

    /// Failure raised by a hook or body while composing.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl CompositionError {
    pub fn configuration(target: &TypeName, message: impl Into<String>) -> Self {
        Self::Configuration {
            target: target.clone(),
            message: message.into(),
        }
    }

    pub fn unsupported(target: &TypeName, message: impl Into<String>) -> Self {
        Self::UnsupportedComposition {
            target: target.clone(),
            message: message.into(),
        }
    }

    /// Stable failure class for reports and logs.
    pub fn failure_class(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => failure_class::CONFIGURATION,
            Self::UnsupportedComposition { .. } => failure_class::UNSUPPORTED_COMPOSITION,
            Self::InvalidMixinInstance { .. } => failure_class::INVALID_MIXIN_INSTANCE,
            Self::MissingConstructor { .. } => failure_class::MISSING_CONSTRUCTOR,
            Self::Dispatch(inner) => inner.failure_class(),
        }
    }
}

/// Errors raised by calls routed through a composed instance.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    /// The shape exposes no member with this name on the requested surface.
    #[error("member not found: {member}")]
    MemberNotFound { member: String },

    /// The member exists but is not reachable from the calling surface.
    #[error("member {member} is not accessible from this surface")]
    AccessDenied { member: String },

    /// `proceed` was called from a body that is the end of its chain.
    #[error("member {member} has no next implementation to proceed to")]
    NoContinuation { member: String },

    /// A base-call depth outside `0..=mixin_count` was requested.
    ///
    /// Unreachable through the public surface; indicates a synthesis bug.
    #[error("invalid base-call depth {depth} (mixin count {mixin_count})")]
    InvalidDepth { depth: usize, mixin_count: usize },

    /// The instance has not finished initialization.
    #[error("composed instance is not initialized")]
    NotInitialized,

    /// A write named a field the slot's type does not declare.
    #[error("{owner} declares no field `{field}`")]
    UndeclaredField { owner: String, field: String },

    /// A member body or hook reported a failure.
    #[error("{member}: {message}")]
    Failed { member: String, message: String },
}

impl DispatchError {
    pub fn failed(member: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            member: member.into(),
            message: message.into(),
        }
    }

    pub fn failure_class(&self) -> &'static str {
        match self {
            Self::InvalidDepth { .. } => failure_class::INVALID_DEPTH,
            _ => failure_class::DISPATCH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_classes_are_stable() {
        let target = TypeName::new("Order");
        assert_eq!(
            CompositionError::configuration(&target, "x").failure_class(),
            "configuration_error"
        );
        assert_eq!(
            CompositionError::unsupported(&target, "x").failure_class(),
            "unsupported_composition"
        );
        let depth: CompositionError = DispatchError::InvalidDepth {
            depth: 9,
            mixin_count: 2,
        }
        .into();
        assert_eq!(depth.failure_class(), "invalid_depth");
    }

    #[test]
    fn messages_name_the_target() {
        let err = CompositionError::configuration(&TypeName::new("Order"), "missing IAudit");
        assert_eq!(
            err.to_string(),
            "configuration error for Order: missing IAudit"
        );
    }
}
