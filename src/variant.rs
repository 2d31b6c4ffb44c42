//! # Variant Records
//!
//! Self-describing container an iterator writes its state into. The
//! registries only name, serialize, and parse records; what an iterator puts
//! inside is its own business.
//!
//! ```rust
//! use checkpoint_core::variant::{VariantReader, VariantRecord, VariantWriter};
//!
//! let mut record = VariantRecord::new();
//! record.set_name("Iterator::Range");
//! VariantWriter::new(&mut record).write_scalar("next", &42u64).unwrap();
//!
//! let bytes = record.serialize_to_bytes().unwrap();
//! let mut parsed = VariantRecord::new();
//! assert!(parsed.parse_from_bytes(&bytes));
//! assert_eq!(VariantReader::new(&parsed).read_scalar::<u64>("next").unwrap(), 42);
//! ```

use crate::error::{CheckpointError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    type_name: String,
    entries: BTreeMap<String, Value>,
}

impl VariantRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.type_name = name.into();
    }

    pub fn name(&self) -> &str {
        &self.type_name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn serialize_to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Replace this record with one parsed from `bytes`.
    ///
    /// Returns false and leaves the record untouched when parsing fails.
    pub fn parse_from_bytes(&mut self, bytes: &[u8]) -> bool {
        match serde_json::from_slice::<Self>(bytes) {
            Ok(parsed) => {
                *self = parsed;
                true
            }
            Err(_) => false,
        }
    }
}

/// Write access handed to an iterator's save.
#[derive(Debug)]
pub struct VariantWriter<'a> {
    record: &'a mut VariantRecord,
}

impl<'a> VariantWriter<'a> {
    pub fn new(record: &'a mut VariantRecord) -> Self {
        Self { record }
    }

    pub fn write_scalar<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.record.entries.insert(key.to_string(), value);
        Ok(())
    }

    pub fn write_bytes(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        self.write_scalar(key, bytes)
    }
}

/// Read access handed to an iterator's restore.
#[derive(Debug, Clone, Copy)]
pub struct VariantReader<'a> {
    record: &'a VariantRecord,
}

impl<'a> VariantReader<'a> {
    pub fn new(record: &'a VariantRecord) -> Self {
        Self { record }
    }

    pub fn name(&self) -> &str {
        self.record.name()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.record.entries.contains_key(key)
    }

    pub fn read_scalar<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.record.entries.get(key).ok_or_else(|| {
            CheckpointError::malformed(
                format!("variant record '{}'", self.record.name()),
                format!("missing key '{key}'"),
            )
        })?;
        Ok(T::deserialize(value)?)
    }

    pub fn read_bytes(&self, key: &str) -> Result<Vec<u8>> {
        self.read_scalar(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_failure_leaves_record_untouched() {
        let mut record = VariantRecord::new();
        record.set_name("kept");
        assert!(!record.parse_from_bytes(b"\x00\x01 not a record"));
        assert_eq!(record.name(), "kept");
    }

    #[test]
    fn test_missing_key_is_malformed() {
        let record = VariantRecord::new();
        let err = VariantReader::new(&record)
            .read_scalar::<u32>("absent")
            .unwrap_err();
        assert!(matches!(err, CheckpointError::Malformed { .. }));
    }

    #[test]
    fn test_bytes_and_structured_values() {
        let mut record = VariantRecord::new();
        {
            let mut writer = VariantWriter::new(&mut record);
            writer.write_bytes("buffer", &[1, 2, 255]).unwrap();
            writer.write_scalar("shape", &vec![2usize, 3]).unwrap();
        }
        let reader = VariantReader::new(&record);
        assert_eq!(reader.read_bytes("buffer").unwrap(), vec![1, 2, 255]);
        assert_eq!(reader.read_scalar::<Vec<usize>>("shape").unwrap(), vec![2, 3]);
        assert!(reader.contains("shape"));
        assert_eq!(record.len(), 2);
    }
}
