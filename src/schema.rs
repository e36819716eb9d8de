// src/schema.rs

//! Fixed feature layouts and the numeric records built from them.
//!
//! A schema is declared statically as an ordered list of [`FeatureDef`]s.
//! A per-file-type schema embeds another schema (normally the GIT one) and
//! appends its own slots, so slot indices of the embedded part are shared.

use std::fmt;

/// Name of the output label slot, always at index 0.
pub const LABEL_FEATURE: &str = "RC_ID";

/// Logical category of records, e.g. `GIT` or `XML`. Used in file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordType(pub &'static str);

impl RecordType {
    pub const GIT: RecordType = RecordType("GIT");
    pub const XML: RecordType = RecordType("XML");

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// One named slot of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureDef {
    pub name: &'static str,
    /// Categorical slot whose strings are interned into a vocabulary
    pub is_vocabulary: bool,
}

impl FeatureDef {
    pub const fn numeric(name: &'static str) -> Self {
        FeatureDef { name, is_vocabulary: false }
    }

    pub const fn vocabulary(name: &'static str) -> Self {
        FeatureDef { name, is_vocabulary: true }
    }
}

#[derive(Debug)]
pub struct FeatureSchema {
    embedded: Option<&'static FeatureSchema>,
    own: &'static [FeatureDef],
}

impl FeatureSchema {
    /// Schema with no embedded part. `own[0]` must be the label slot.
    pub const fn new(own: &'static [FeatureDef]) -> Self {
        FeatureSchema { embedded: None, own }
    }

    /// Schema made of all of `embedded`'s slots followed by `own`.
    pub const fn extending(embedded: &'static FeatureSchema, own: &'static [FeatureDef]) -> Self {
        FeatureSchema { embedded: Some(embedded), own }
    }

    pub fn len(&self) -> usize {
        self.embedded_len() + self.own.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the first slot declared by this schema itself
    pub fn embedded_len(&self) -> usize {
        self.embedded.map_or(0, |schema| schema.len())
    }

    pub fn feature(&self, index: usize) -> Option<&FeatureDef> {
        let offset = self.embedded_len();
        if index < offset {
            self.embedded.and_then(|schema| schema.feature(index))
        } else {
            self.own.get(index - offset)
        }
    }

    pub fn features(&self) -> Vec<FeatureDef> {
        let mut features = self.embedded.map(|schema| schema.features()).unwrap_or_default();
        features.extend_from_slice(self.own);
        features
    }

    /// Slot names in record order, used as CSV header
    pub fn names(&self) -> Vec<&'static str> {
        self.features().iter().map(|feature| feature.name).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.features().iter().position(|feature| feature.name == name)
    }

    /// Zero-filled record of this schema's width
    pub fn base(&self) -> Record {
        Record::zeroed(self.len())
    }
}

/// Fixed-width integer feature vector. Slot 0 holds the label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record(Vec<i64>);

impl Record {
    pub fn zeroed(len: usize) -> Self {
        Record(vec![0; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> i64 {
        self.0[index]
    }

    pub fn set(&mut self, index: usize, value: i64) {
        self.0[index] = value;
    }

    pub fn label(&self) -> i64 {
        self.0[0]
    }

    pub fn set_label(&mut self, label: i64) {
        self.0[0] = label;
    }

    pub fn values(&self) -> &[i64] {
        &self.0
    }

    /// Copies `base` over the leading slots of this record.
    pub fn overlay(&mut self, base: &Record) {
        let len = base.len().min(self.len());
        self.0[..len].copy_from_slice(&base.0[..len]);
    }

    /// Comma separated values, no trailing newline
    pub fn to_csv_line(&self) -> String {
        let mut line = String::with_capacity(self.0.len() * 3);
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&value.to_string());
        }
        line
    }
}
