//! The flat record: one composed instance, captured as plain data.
//!
//! A record holds the configuration descriptor, its key, the target's field
//! state and each mixin's field state in configuration order. Proxies and
//! dispatch tables are never recorded; they are regenerated on load.

use crate::error::SurrogateError;
use mixweave_kernel::{ConfigurationDescriptor, ConfigurationKey, FieldState, TypeName};
use serde::{Deserialize, Serialize};

pub const RECORD_SCHEMA: u32 = 1;
pub const RECORD_KIND: &str = "mixweave.flat_record.v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatRecord {
    pub schema: u32,
    pub record_kind: String,
    pub configuration: ConfigurationDescriptor,
    pub configuration_key: ConfigurationKey,
    pub target_fields: FieldState,
    pub mixins: Vec<MixinRecord>,
}

/// Field state of one mixin, tagged with its declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixinRecord {
    pub mixin_type: TypeName,
    pub fields: FieldState,
}

impl FlatRecord {
    pub fn to_json(&self) -> Result<String, SurrogateError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, SurrogateError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Check schema, kind, that the descriptor is in normal form, and that
    /// the stored key matches it.
    pub fn check_header(&self) -> Result<(), SurrogateError> {
        if self.schema != RECORD_SCHEMA {
            return Err(SurrogateError::corrupt(format!(
                "unsupported schema {} (expected {RECORD_SCHEMA})",
                self.schema
            )));
        }
        if self.record_kind != RECORD_KIND {
            return Err(SurrogateError::corrupt(format!(
                "unexpected record kind `{}`",
                self.record_kind
            )));
        }
        match self.configuration.renormalize() {
            Ok(normal) if normal == self.configuration => {}
            Ok(_) => {
                return Err(SurrogateError::corrupt(
                    "configuration descriptor is not in normal form",
                ));
            }
            Err(err) => {
                return Err(SurrogateError::corrupt(format!(
                    "configuration descriptor is invalid: {err}"
                )));
            }
        }
        let key = self.configuration.key();
        if key != self.configuration_key {
            return Err(SurrogateError::corrupt(format!(
                "configuration key mismatch: stored {}, computed {}",
                self.configuration_key.short(),
                key.short()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixweave_kernel::CompositionRequest;

    fn record() -> FlatRecord {
        let configuration = CompositionRequest::new("Order").mixin("Audit").normalize().unwrap();
        FlatRecord {
            schema: RECORD_SCHEMA,
            record_kind: RECORD_KIND.to_string(),
            configuration_key: configuration.key(),
            configuration,
            target_fields: FieldState::new(),
            mixins: Vec::new(),
        }
    }

    #[test]
    fn header_accepts_matching_key() {
        assert!(record().check_header().is_ok());
    }

    #[test]
    fn header_rejects_tampered_descriptor() {
        let mut record = record();
        record.configuration.interfaces.push(TypeName::new("IExtra"));
        let err = record.check_header().unwrap_err();
        assert_eq!(err.failure_class(), "record_corrupt");
        assert!(err.to_string().contains("key mismatch"));
    }

    #[test]
    fn header_rejects_unknown_schema() {
        let mut record = record();
        record.schema = 7;
        assert!(record.check_header().unwrap_err().to_string().contains("schema 7"));
    }
}
