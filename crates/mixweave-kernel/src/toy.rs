//! Toy type universes for dispatch conformance vectors.
//!
//! Every body returns a string trace of the implementations it ran, so a
//! fixture can state the full path of a call as plain data:
//! `"M1>M3>T"` means mixin `M1` ran, proceeded to `M3`, which proceeded to
//! the target.
//!
//! ## Universes
//!
//! - **chain**: target `Order` with overridable `save`; five mixins
//!   `M0..M4`, of which `M1` and `M3` override `save`.
//! - **introduced**: mixin `Audit` introduces `IAudit` publicly, `Vault`
//!   introduces `ISecret` (requested with private introductions), and the
//!   target satisfies `IPrintable` by duck matching.
//! - **target_override**: the target overrides the protected
//!   `Cache.flush`; `Shadow` also tries to override it.
//! - **base_calls**: `Retry` calls `IStore.put` through its base-call proxy,
//!   implemented by the later mixin `Store`.

use crate::error::{CompositionError, DispatchError};
use crate::instance::ComposedInstance;
use crate::invocation::Invocation;
use crate::model::{InterfaceDef, MethodDecl, Signature, TypeDef, TypeUniverse, Visibility};
use serde::Deserialize;
use serde_json::{Value, json};

/// Get a toy universe by name (matching the fixture "universe" field).
pub fn get_universe(name: &str) -> Option<TypeUniverse> {
    let built = match name {
        "chain" => chain(),
        "introduced" => introduced(),
        "target_override" => target_override(),
        "base_calls" => base_calls(),
        _ => return None,
    };
    built.ok()
}

/// One call of a fixture script.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToyCall {
    /// Plain-name call on the composed entity.
    Call {
        member: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    /// Interface-qualified call.
    Interface {
        interface: String,
        member: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    /// Call through the base-call proxy at `depth`.
    Base {
        depth: usize,
        member: String,
        #[serde(default)]
        args: Vec<Value>,
    },
}

impl ToyCall {
    /// Run the call and render its outcome as fixture JSON.
    pub fn run(&self, instance: &ComposedInstance) -> Value {
        let result = match self {
            Self::Call { member, args } => instance.call(member, args),
            Self::Interface {
                interface,
                member,
                args,
            } => instance.call_interface(interface, member, args),
            Self::Base {
                depth,
                member,
                args,
            } => instance
                .base_call_proxy(*depth)
                .and_then(|proxy| proxy.call(member, args)),
        };
        match result {
            Ok(value) => json!({ "ok": value }),
            Err(err) => dispatch_failure(&err),
        }
    }
}

pub fn dispatch_failure(err: &DispatchError) -> Value {
    json!({ "failureClass": err.failure_class(), "message": err.to_string() })
}

pub fn composition_failure(err: &CompositionError) -> Value {
    json!({ "failureClass": err.failure_class(), "message": err.to_string() })
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A body that returns its label.
fn terminal(
    label: &'static str,
) -> impl Fn(&Invocation<'_>, &[Value]) -> Result<Value, DispatchError> + Send + Sync + 'static {
    move |_, _| Ok(Value::String(label.to_string()))
}

/// A body that prefixes its label to whatever `proceed` returns.
fn passthrough(
    label: &'static str,
) -> impl Fn(&Invocation<'_>, &[Value]) -> Result<Value, DispatchError> + Send + Sync + 'static {
    move |ctx, args| {
        let rest = ctx.proceed(args)?;
        Ok(Value::String(format!("{label}>{}", text(&rest))))
    }
}

fn returns_text() -> Signature {
    Signature::returning("String")
}

fn text_to_text() -> Signature {
    Signature::new(["String"], Some("String"))
}

fn chain() -> Result<TypeUniverse, CompositionError> {
    let mut universe = TypeUniverse::new().with_type(
        TypeDef::class("Order")
            .method(MethodDecl::new("save", returns_text(), terminal("T")).overridable())
            .method(MethodDecl::new("describe", returns_text(), terminal("Order"))),
    )?;
    for name in ["M0", "M1", "M2", "M3", "M4"] {
        let mut def = TypeDef::class(name);
        if name == "M1" || name == "M3" {
            def = def.method(MethodDecl::new("save", returns_text(), passthrough(name)).overrides_target());
        }
        universe.register_type(def)?;
    }
    Ok(universe)
}

fn introduced() -> Result<TypeUniverse, CompositionError> {
    TypeUniverse::new()
        .with_interface(InterfaceDef::new("IAudit").method("log", text_to_text()))?
        .with_interface(InterfaceDef::new("ISecret").method("reveal", returns_text()))?
        .with_interface(InterfaceDef::new("IPrintable").method("print", returns_text()))?
        .with_type(
            TypeDef::class("Order")
                .method(MethodDecl::new("print", returns_text(), terminal("Order.print")))
                .method(
                    MethodDecl::new("audit_count", returns_text(), terminal("0"))
                        .visibility(Visibility::Private),
                ),
        )?
        .with_type(
            TypeDef::class("Audit")
                .field("count", json!(0))
                .implements("IAudit")
                .method(MethodDecl::new("log", text_to_text(), |ctx, args| {
                    let count = ctx.get("count").as_u64().unwrap_or(0) + 1;
                    ctx.set("count", json!(count))?;
                    let entry = args.first().map(text).unwrap_or_default();
                    Ok(Value::String(format!("logged {entry} #{count}")))
                })),
        )?
        .with_type(
            TypeDef::class("Vault")
                .implements("ISecret")
                .method(MethodDecl::new("reveal", returns_text(), terminal("secret"))),
        )
}

fn target_override() -> Result<TypeUniverse, CompositionError> {
    TypeUniverse::new()
        .with_interface(InterfaceDef::new("ICache").method("flush", returns_text()))?
        .with_type(
            TypeDef::class("Order").method(
                MethodDecl::new("flush", returns_text(), passthrough("T")).overrides_mixin("Cache"),
            ),
        )?
        .with_type(
            TypeDef::class("Cache")
                .implements("ICache")
                .method(
                    MethodDecl::new("flush", returns_text(), terminal("Cache.flush"))
                        .visibility(Visibility::Protected)
                        .overridable(),
                )
                .method(
                    MethodDecl::new("evict", returns_text(), terminal("Cache.evict"))
                        .visibility(Visibility::Private),
                ),
        )?
        .with_type(TypeDef::class("Shadow").method(
            MethodDecl::new("flush", returns_text(), passthrough("Shadow")).overrides_mixin("Cache"),
        ))
}

fn base_calls() -> Result<TypeUniverse, CompositionError> {
    TypeUniverse::new()
        .with_interface(InterfaceDef::new("IStore").method("put", text_to_text()))?
        .with_interface(InterfaceDef::new("IRetry").method("attempt", text_to_text()))?
        .with_type(TypeDef::class("Order"))?
        .with_type(
            TypeDef::class("Retry")
                .implements("IRetry")
                .requires_base("IStore")
                .method(MethodDecl::new("attempt", text_to_text(), |ctx, args| {
                    let stored = ctx.base()?.call("put", args)?;
                    Ok(Value::String(format!("retry>{}", text(&stored))))
                })),
        )?
        .with_type(
            TypeDef::class("Store")
                .implements("IStore")
                .method(MethodDecl::new("put", text_to_text(), |_, args| {
                    let value = args.first().map(text).unwrap_or_default();
                    Ok(Value::String(format!("stored {value}")))
                })),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_universe_builds() {
        for name in ["chain", "introduced", "target_override", "base_calls"] {
            assert!(get_universe(name).is_some(), "{name}");
        }
        assert!(get_universe("missing").is_none());
    }
}
