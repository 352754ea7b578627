//! The context a member body or lifecycle hook runs in.
//!
//! An `Invocation` knows which slot of the composed instance is executing
//! (the target or mixin `i`), gives access to that slot's fields, to the
//! composed entity as a whole (`this`), to the slot's base-call proxy
//! (`base`), and to the continuation of the current override chain
//! (`proceed`).

use crate::error::DispatchError;
use crate::instance::{ComposedInstance, InitMode, Slot};
use crate::model::FieldState;
use crate::proxy::{self, BaseCallProxy};
use serde_json::Value;

/// What `proceed` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Continuation<'a> {
    /// Nothing follows; `proceed` fails.
    End,
    /// Re-enter the chain of a target member at `depth`.
    Chain { member: &'a str, depth: usize },
    /// The mixin member a target overrider replaced.
    Original { index: usize, method: &'a str },
}

pub struct Invocation<'a> {
    instance: &'a ComposedInstance,
    slot: Slot,
    member: &'a str,
    continuation: Continuation<'a>,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        instance: &'a ComposedInstance,
        slot: Slot,
        member: &'a str,
        continuation: Continuation<'a>,
    ) -> Self {
        Self {
            instance,
            slot,
            member,
            continuation,
        }
    }

    /// The composed entity, as seen from outside.
    pub fn this(&self) -> &'a ComposedInstance {
        self.instance
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Name of the member (or hook) being run.
    pub fn member(&self) -> &'a str {
        self.member
    }

    pub fn mode(&self) -> InitMode {
        self.instance.mode()
    }

    pub fn is_deserializing(&self) -> bool {
        self.mode() == InitMode::Deserialization
    }

    /// A field of the executing slot; `Null` when unset.
    pub fn get(&self, field: &str) -> Value {
        self.instance
            .slot_field(self.slot, field)
            .unwrap_or(Value::Null)
    }

    /// Write a declared field of the executing slot.
    pub fn set(&self, field: &str, value: Value) -> Result<(), DispatchError> {
        self.instance.set_field(self.slot, field, value)
    }

    pub fn fields(&self) -> FieldState {
        self.instance.slot_fields(self.slot)
    }

    /// The base-call proxy of the executing mixin, positioned just past it.
    ///
    /// The target has no base: it is the end of every chain.
    pub fn base(&self) -> Result<BaseCallProxy<'a>, DispatchError> {
        match self.slot {
            Slot::Mixin(index) => self.instance.base_call_proxy(index + 1),
            Slot::Target => Err(DispatchError::NoContinuation {
                member: self.member.to_string(),
            }),
        }
    }

    /// Run the next implementation of the current member.
    pub fn proceed(&self, args: &[Value]) -> Result<Value, DispatchError> {
        match self.continuation {
            Continuation::End => Err(DispatchError::NoContinuation {
                member: self.member.to_string(),
            }),
            Continuation::Chain { member, depth } => {
                self.instance.base_call_proxy(depth)?.call(member, args)
            }
            Continuation::Original { index, method } => {
                proxy::run_mixin_member(self.instance, index, method, args)
            }
        }
    }
}
