// src/vocabulary.rs

use crate::schema::{FeatureSchema, Record};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::error;

#[derive(Debug, Default)]
struct Vocabulary {
    indices: HashMap<String, i64>,
    values: Vec<String>,
}

impl Vocabulary {
    fn intern(&mut self, value: &str) -> i64 {
        if let Some(&index) = self.indices.get(value) {
            return index;
        }
        let index = self.values.len() as i64;
        self.indices.insert(value.to_string(), index);
        self.values.push(value.to_string());
        index
    }
}

/// Vocabularies of one record type, shared by all its producers in a run.
///
/// A new string gets its map's current size as index, so indices follow
/// first appearance and never change. The mapping is therefore a function of
/// interning order: with several worker threads it differs between runs.
#[derive(Debug)]
pub struct VocabularyRegistry {
    schema: &'static FeatureSchema,
    slots: Vec<Option<Mutex<Vocabulary>>>,
}

impl VocabularyRegistry {
    pub fn new(schema: &'static FeatureSchema) -> Self {
        let slots = schema
            .features()
            .iter()
            .map(|feature| feature.is_vocabulary.then(|| Mutex::new(Vocabulary::default())))
            .collect();
        VocabularyRegistry { schema, slots }
    }

    /// Interns `value` for the vocabulary slot `feature_index` and writes its
    /// index into `record`.
    pub fn intern_and_set(&self, feature_index: usize, value: &str, record: &mut Record) {
        match self.slots.get(feature_index).and_then(Option::as_ref) {
            Some(vocabulary) => {
                let index = vocabulary.lock().intern(value);
                record.set(feature_index, index);
            }
            None => error!(feature_index, "feature is not a vocabulary feature"),
        }
    }

    /// Index of `value` if it was interned already
    pub fn lookup(&self, feature_index: usize, value: &str) -> Option<i64> {
        let vocabulary = self.slots.get(feature_index)?.as_ref()?;
        let guard = vocabulary.lock();
        guard.indices.get(value).copied()
    }

    /// Non-empty vocabularies as `(feature name, strings ordered by index)`
    pub fn dump_all(&self) -> Vec<(&'static str, Vec<String>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let values = slot.as_ref()?.lock().values.clone();
                if values.is_empty() {
                    return None;
                }
                let name = self.schema.feature(index)?.name;
                Some((name, values))
            })
            .collect()
    }

    pub fn clear(&self) {
        for vocabulary in self.slots.iter().flatten() {
            *vocabulary.lock() = Vocabulary::default();
        }
    }
}
