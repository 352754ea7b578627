//! Deterministic validation reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub mod failure_class {
    pub const MANIFEST_SCHEMA_INVALID: &str = "manifest_schema_invalid";
    pub const IDENTIFIER_INVALID: &str = "identifier_invalid";
    pub const COMPOSITION_DUPLICATE: &str = "composition_duplicate";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub failure_class: String,
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub result: String,
    pub failure_classes: Vec<String>,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Issues sorted by path, class, then message; classes de-duplicated.
    pub fn from_issues(mut issues: Vec<ValidationIssue>) -> Self {
        issues.sort_by(|a, b| {
            (&a.path, &a.failure_class, &a.message).cmp(&(&b.path, &b.failure_class, &b.message))
        });
        let failure_classes: Vec<String> = issues
            .iter()
            .map(|issue| issue.failure_class.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self {
            result: if issues.is_empty() {
                "accepted".to_string()
            } else {
                "rejected".to_string()
            },
            failure_classes,
            issues,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.issues.is_empty()
    }
}

pub(crate) fn push_issue(
    issues: &mut Vec<ValidationIssue>,
    failure_class: &str,
    path: String,
    message: String,
) {
    issues.push(ValidationIssue {
        failure_class: failure_class.to_string(),
        path,
        message,
    });
}
