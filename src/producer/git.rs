// src/producer/git.rs

use super::RecordProducer;
use crate::model::{File, Line};
use crate::schema::{FeatureDef, FeatureSchema, Record, RecordType, LABEL_FEATURE};
use crate::vocabulary::VocabularyRegistry;

pub const GIT_LINE_TYPE: usize = 1;
pub const GIT_PIECES_NUMBER: usize = 2;
pub const GIT_LINE_LENGTH: usize = 3;
pub const V_GIT_FILE: usize = 4;

/// Common features of every changed line, whatever the file type
pub static GIT_SCHEMA: FeatureSchema = FeatureSchema::new(&[
    FeatureDef::numeric(LABEL_FEATURE),
    FeatureDef::numeric("GIT_LINE_TYPE"),
    FeatureDef::numeric("GIT_PIECES_NUMBER"),
    FeatureDef::numeric("GIT_LINE_LENGTH"),
    FeatureDef::vocabulary("V_GIT_FILE"),
]);

#[derive(Debug, Default, Clone, Copy)]
pub struct GitProducer;

impl RecordProducer for GitProducer {
    fn record_type(&self) -> RecordType {
        RecordType::GIT
    }

    fn schema(&self) -> &'static FeatureSchema {
        &GIT_SCHEMA
    }

    fn file_features(&self, file: &File, record: &mut Record, vocabulary: &VocabularyRegistry) {
        record.set(GIT_PIECES_NUMBER, file.pieces.len() as i64);
        vocabulary.intern_and_set(V_GIT_FILE, &file.path, record);
    }

    fn line_features(&self, line: &Line, record: &mut Record, _vocabulary: &VocabularyRegistry) {
        record.set(GIT_LINE_TYPE, line.kind.value());
        record.set(GIT_LINE_LENGTH, line.len() as i64);
    }
}
