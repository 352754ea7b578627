//! Override resolution.
//!
//! For a member declared on the target class, the override chain is the
//! ordered list of mixins overriding it, terminated by the target's own
//! implementation. `next_in_chain(member, depth)` answers "who runs next
//! when a call enters the chain at `depth`": the first overriding mixin with
//! index `>= depth`, or the target when none is left.
//!
//! Resolution is a pure function of the configuration. The synthesizer
//! evaluates it once per `(member, depth)` for depths `0..=mixin_count` and
//! stores the result as a flat table; calls never walk the chain.

use crate::configuration::ClassConfiguration;
use crate::error::{CompositionError, DispatchError};
use serde::Serialize;

/// A concrete implementation a call can land on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Implementation {
    /// The target's own implementation, the terminus of every chain.
    Target { method: String },
    /// A mixin's override.
    Mixin { index: usize, method: String },
}

impl Implementation {
    pub fn method(&self) -> &str {
        match self {
            Self::Target { method } | Self::Mixin { method, .. } => method,
        }
    }

    pub fn mixin_index(&self) -> Option<usize> {
        match self {
            Self::Target { .. } => None,
            Self::Mixin { index, .. } => Some(*index),
        }
    }
}

/// Resolve the implementation a call entering the chain of `member` at
/// `from_depth` runs.
///
/// `member` must be declared on the target. `from_depth` ranges over
/// `0..=mixin_count`; depth `mixin_count` always resolves to the target.
pub fn next_in_chain(
    configuration: &ClassConfiguration,
    member: &str,
    from_depth: usize,
) -> Result<Implementation, CompositionError> {
    let mixin_count = configuration.mixin_count();
    if from_depth > mixin_count {
        return Err(DispatchError::InvalidDepth {
            depth: from_depth,
            mixin_count,
        }
        .into());
    }
    let Some(declared) = configuration.target_method(member) else {
        return Err(CompositionError::configuration(
            configuration.target_name(),
            format!("`{member}` is not declared on the target; only target members form chains"),
        ));
    };

    // Overriders are stored in ascending mixin order, so the first one at
    // or past the depth wins.
    let next = declared
        .overriding_mixins()
        .find(|index| *index >= from_depth);
    Ok(match next {
        Some(index) => Implementation::Mixin {
            index,
            method: member.to_string(),
        },
        None => Implementation::Target {
            method: member.to_string(),
        },
    })
}

/// Unrolled chain for one member: entry `d` is `next_in_chain(member, d)`.
pub fn chain_table(
    configuration: &ClassConfiguration,
    member: &str,
) -> Result<Vec<Implementation>, CompositionError> {
    (0..=configuration.mixin_count())
        .map(|depth| next_in_chain(configuration, member, depth))
        .collect()
}
