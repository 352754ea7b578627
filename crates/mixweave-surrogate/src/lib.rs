//! # Mixweave Surrogate
//!
//! Persistence for composed instances. A composed instance cannot be
//! serialized as an object graph: its proxies and mixin objects refer to a
//! shape that only exists once synthesized. Instead the whole instance is
//! captured as one `FlatRecord` and rebuilt bottom-up through the registry.

pub mod error;
pub mod jsonl;
pub mod record;
pub mod surrogate;

pub use error::SurrogateError;
pub use jsonl::{read_records, write_records};
pub use record::{FlatRecord, MixinRecord, RECORD_KIND, RECORD_SCHEMA};
pub use surrogate::{FlatSurrogate, Surrogate, SurrogateRegistry};
