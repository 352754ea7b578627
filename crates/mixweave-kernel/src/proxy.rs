//! Base-call proxies and table-driven dispatch.
//!
//! A base-call proxy at depth `d` stands for "everything after mixin
//! `d - 1`": calling a target member through it enters that member's chain
//! at `d`, calling an interface method introduced by a mixin reaches the
//! first such mixin at index `>= d`. Depth 0 is the composed entity itself
//! and is what external calls use.
//!
//! Proxies are borrowed views of the instance; they hold no state of their
//! own, so there is nothing to keep alive or to cycle.

use crate::error::DispatchError;
use crate::instance::{ComposedInstance, Slot};
use crate::invocation::{Continuation, Invocation};
use crate::model::OverrideDecl;
use crate::resolver::Implementation;
use crate::shape::Forward;
use serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub struct BaseCallProxy<'a> {
    instance: &'a ComposedInstance,
    depth: usize,
}

impl<'a> BaseCallProxy<'a> {
    pub(crate) fn new(instance: &'a ComposedInstance, depth: usize) -> Self {
        Self { instance, depth }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn instance(&self) -> &'a ComposedInstance {
        self.instance
    }

    /// Call `member` as seen from this depth.
    ///
    /// Non-public members are reachable: base calls are privileged.
    pub fn call(&self, member: &str, args: &[Value]) -> Result<Value, DispatchError> {
        let shape = self.instance.shape();
        if let Some(implementation) = shape.dispatch_target(member, self.depth)? {
            return run_implementation(self.instance, member, implementation, args);
        }
        if let Some(forward) = shape.base_forward(member, self.depth)? {
            return run_forward(self.instance, &forward, args);
        }
        Err(DispatchError::MemberNotFound {
            member: member.to_string(),
        })
    }

    pub fn get_property(&self, name: &str) -> Result<Value, DispatchError> {
        let getter = self
            .instance
            .configuration()
            .target()
            .find_property(name)
            .and_then(|p| p.getter.as_deref())
            .ok_or_else(|| DispatchError::MemberNotFound {
                member: name.to_string(),
            })?;
        self.call(getter, &[])
    }

    pub fn set_property(&self, name: &str, value: Value) -> Result<(), DispatchError> {
        let setter = self
            .instance
            .configuration()
            .target()
            .find_property(name)
            .and_then(|p| p.setter.as_deref())
            .ok_or_else(|| DispatchError::MemberNotFound {
                member: name.to_string(),
            })?;
        self.call(setter, &[value]).map(|_| ())
    }

    pub fn add_handler(&self, event: &str, handler: Value) -> Result<(), DispatchError> {
        let decl = self.target_event(event)?;
        self.call(&decl.add, &[handler]).map(|_| ())
    }

    pub fn remove_handler(&self, event: &str, handler: Value) -> Result<(), DispatchError> {
        let decl = self.target_event(event)?;
        self.call(&decl.remove, &[handler]).map(|_| ())
    }

    fn target_event(&self, event: &str) -> Result<&'a crate::model::EventDecl, DispatchError> {
        self.instance
            .configuration()
            .target()
            .find_event(event)
            .ok_or_else(|| DispatchError::MemberNotFound {
                member: event.to_string(),
            })
    }
}

/// Run one entry of a chain table.
pub(crate) fn run_implementation<'a>(
    instance: &'a ComposedInstance,
    member: &'a str,
    implementation: &'a Implementation,
    args: &[Value],
) -> Result<Value, DispatchError> {
    match implementation {
        Implementation::Mixin { index, method } => run_body(
            instance,
            Slot::Mixin(*index),
            method,
            args,
            Continuation::Chain {
                member,
                depth: index + 1,
            },
        ),
        Implementation::Target { method } => {
            let configuration = instance.configuration();
            // A target member that overrides a mixin member proceeds to the
            // mixin's original.
            let original = configuration
                .target()
                .find_method(method)
                .and_then(|decl| match &decl.overrides {
                    Some(OverrideDecl::Mixin(mixin)) => configuration.mixin_index_of(mixin),
                    _ => None,
                });
            let continuation = match original {
                Some(index) => Continuation::Original {
                    index,
                    method: method.as_str(),
                },
                None => Continuation::End,
            };
            run_body(instance, Slot::Target, method, args, continuation)
        }
    }
}

pub(crate) fn run_forward(
    instance: &ComposedInstance,
    forward: &Forward,
    args: &[Value],
) -> Result<Value, DispatchError> {
    match forward {
        Forward::Chain { member, depth } => instance.base_call_proxy(*depth)?.call(member, args),
        Forward::Mixin { index, method } => run_mixin_member(instance, *index, method, args),
        Forward::OverriddenMixin { overrider, .. } => {
            instance.base_call_proxy(0)?.call(overrider, args)
        }
    }
}

/// Run a mixin member directly, bypassing any override of it.
pub(crate) fn run_mixin_member(
    instance: &ComposedInstance,
    index: usize,
    method: &str,
    args: &[Value],
) -> Result<Value, DispatchError> {
    run_body(instance, Slot::Mixin(index), method, args, Continuation::End)
}

fn run_body<'a>(
    instance: &'a ComposedInstance,
    slot: Slot,
    method: &'a str,
    args: &[Value],
    continuation: Continuation<'a>,
) -> Result<Value, DispatchError> {
    let configuration = instance.configuration();
    let not_found = || DispatchError::MemberNotFound {
        member: method.to_string(),
    };
    let decl = match slot {
        Slot::Target => configuration.target().find_method(method),
        Slot::Mixin(index) => configuration
            .mixin(index)
            .and_then(|m| m.definition.find_method(method)),
    }
    .ok_or_else(not_found)?;

    if let Slot::Mixin(index) = slot
        && !decl.visibility.is_public()
    {
        let wrapped = instance
            .shape()
            .wrapper(index)
            .and_then(|w| w.public_wrapper(method))
            .is_some();
        if !wrapped {
            return Err(DispatchError::AccessDenied {
                member: method.to_string(),
            });
        }
    }

    tracing::trace!(?slot, member = method, "dispatch");
    let invocation = Invocation::new(instance, slot, method, continuation);
    (decl.body)(&invocation, args)
}
