//! Manifest validation against a type universe.

use crate::error::ManifestError;
use crate::manifest::{CompositionEntry, MANIFEST_SCHEMA, Manifest};
use crate::report::{ValidationIssue, ValidationReport, failure_class, push_issue};
use mixweave_kernel::{
    ClassConfiguration, ComposedShape, CompositionRegistry, ConfigurationDescriptor, TypeUniverse,
};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*$")
            .expect("identifier regex must compile")
    })
}

fn check_identifier(issues: &mut Vec<ValidationIssue>, path: String, name: &str) -> bool {
    if identifier_re().is_match(name) {
        return true;
    }
    push_issue(
        issues,
        failure_class::IDENTIFIER_INVALID,
        path,
        format!("`{name}` is not a valid type name"),
    );
    false
}

fn check_identifiers(issues: &mut Vec<ValidationIssue>, path: &str, entry: &CompositionEntry) -> bool {
    let mut valid = check_identifier(issues, format!("{path}.target"), &entry.target);
    for (idx, interface) in entry.interfaces.iter().enumerate() {
        valid &= check_identifier(issues, format!("{path}.interfaces[{idx}]"), interface);
    }
    for (idx, mixin) in entry.mixins.iter().enumerate() {
        let mixin_path = format!("{path}.mixin[{idx}]");
        valid &= check_identifier(issues, format!("{mixin_path}.type"), &mixin.mixin_type);
        for (after_idx, after) in mixin.after.iter().enumerate() {
            valid &= check_identifier(issues, format!("{mixin_path}.after[{after_idx}]"), after);
        }
    }
    valid
}

/// Check every composition of a manifest against `universe`.
///
/// Each composition is normalized and configured exactly as the registry
/// would; kernel errors are reported with their own failure class. Two
/// entries that normalize to the same descriptor are duplicates.
pub fn validate(manifest: &Manifest, universe: &TypeUniverse) -> ValidationReport {
    let mut issues = Vec::new();
    if manifest.schema != MANIFEST_SCHEMA {
        push_issue(
            &mut issues,
            failure_class::MANIFEST_SCHEMA_INVALID,
            "schema".to_string(),
            format!("schema must be {MANIFEST_SCHEMA}, got {}", manifest.schema),
        );
    }
    if manifest.compositions.is_empty() {
        push_issue(
            &mut issues,
            failure_class::MANIFEST_SCHEMA_INVALID,
            "composition".to_string(),
            "composition must be non-empty".to_string(),
        );
    }

    let mut seen: HashMap<ConfigurationDescriptor, usize> = HashMap::new();
    for (idx, entry) in manifest.compositions.iter().enumerate() {
        let path = format!("composition[{idx}]");
        if !check_identifiers(&mut issues, &path, entry) {
            continue;
        }
        let checked = entry.request().normalize().and_then(|descriptor| {
            ClassConfiguration::from_descriptor(universe, descriptor.clone()).map(|_| descriptor)
        });
        match checked {
            Ok(descriptor) => {
                if let Some(first) = seen.get(&descriptor) {
                    push_issue(
                        &mut issues,
                        failure_class::COMPOSITION_DUPLICATE,
                        path,
                        format!("duplicates composition[{first}]"),
                    );
                } else {
                    seen.insert(descriptor, idx);
                }
            }
            Err(err) => push_issue(&mut issues, err.failure_class(), path, err.to_string()),
        }
    }

    let report = ValidationReport::from_issues(issues);
    debug!(
        compositions = manifest.compositions.len(),
        issues = report.issues.len(),
        result = %report.result,
        "validated composition manifest"
    );
    report
}

/// Validate a manifest against the registry's universe, then synthesize the
/// shape of every composition it lists.
pub fn precompose(
    manifest: &Manifest,
    registry: &CompositionRegistry,
) -> Result<Vec<Arc<ComposedShape>>, ManifestError> {
    let report = validate(manifest, registry.universe());
    if !report.is_accepted() {
        return Err(ManifestError::Rejected(report));
    }
    let shapes = manifest
        .requests()
        .iter()
        .map(|request| registry.shape_for(request))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(shapes = shapes.len(), "precomposed manifest");
    Ok(shapes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixweave_kernel::toy::get_universe;

    fn universe(name: &str) -> TypeUniverse {
        get_universe(name).unwrap()
    }

    #[test]
    fn accepts_satisfiable_compositions() {
        let manifest = Manifest::from_toml_str(
            r#"
schema = 1

[[composition]]
target = "Order"
interfaces = ["IPrintable"]

[[composition.mixin]]
type = "Audit"

[[composition.mixin]]
type = "Vault"
visibility = "private"
"#,
        )
        .unwrap();
        insta::assert_json_snapshot!(validate(&manifest, &universe("introduced")), @r#"
        {
          "result": "accepted",
          "failureClasses": [],
          "issues": []
        }
        "#);
    }

    #[test]
    fn reports_every_rejected_composition() {
        let manifest = Manifest::from_toml_str(
            r#"
schema = 2

[[composition]]
target = "Order"
mixin = [{ type = "Cache" }, { type = "Shadow" }]

[[composition]]
target = "Order"
mixin = [{ type = "Cache" }]

[[composition]]
target = "Order"
mixin = [{ type = "Cache" }]

[[composition]]
target = "Order"
mixin = [{ type = "9lives" }]

[[composition]]
target = "Ghost"
"#,
        )
        .unwrap();
        insta::assert_json_snapshot!(validate(&manifest, &universe("target_override")), @r#"
        {
          "result": "rejected",
          "failureClasses": [
            "composition_duplicate",
            "configuration_error",
            "identifier_invalid",
            "manifest_schema_invalid",
            "unsupported_composition"
          ],
          "issues": [
            {
              "failureClass": "unsupported_composition",
              "path": "composition[0]",
              "message": "unsupported composition for Order: Cache.flush is overridden 2 times; a mixin member supports one override"
            },
            {
              "failureClass": "composition_duplicate",
              "path": "composition[2]",
              "message": "duplicates composition[1]"
            },
            {
              "failureClass": "identifier_invalid",
              "path": "composition[3].mixin[0].type",
              "message": "`9lives` is not a valid type name"
            },
            {
              "failureClass": "configuration_error",
              "path": "composition[4]",
              "message": "configuration error for Ghost: unknown target type"
            },
            {
              "failureClass": "manifest_schema_invalid",
              "path": "schema",
              "message": "schema must be 1, got 2"
            }
          ]
        }
        "#);
    }

    #[test]
    fn ordering_errors_carry_the_kernel_class() {
        let manifest = Manifest::from_toml_str(
            r#"
schema = 1

[[composition]]
target = "Order"
mixin = [{ type = "M1", after = ["M3"] }, { type = "M3", after = ["M1"] }]
"#,
        )
        .unwrap();
        let report = validate(&manifest, &universe("chain"));
        assert_eq!(report.failure_classes, ["configuration_error"]);
        assert!(report.issues[0].message.contains("cycle among M1, M3"));
    }

    #[test]
    fn precompose_synthesizes_each_composition() {
        let manifest = Manifest::from_toml_str(
            r#"
schema = 1

[[composition]]
target = "Order"
mixin = [{ type = "M1" }, { type = "M3" }]

[[composition]]
target = "Order"
mixin = [{ type = "M3" }]
"#,
        )
        .unwrap();
        let registry = CompositionRegistry::new(Arc::new(universe("chain")));
        let shapes = precompose(&manifest, &registry).unwrap();
        assert_eq!(shapes.len(), 2);
        assert_eq!(registry.synthesis_count(), 2);

        let rejected = Manifest::from_toml_str("schema = 1").unwrap();
        let err = precompose(&rejected, &registry).unwrap_err();
        assert_eq!(err.to_string(), "manifest rejected: manifest_schema_invalid");
    }
}
