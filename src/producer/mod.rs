// src/producer/mod.rs

//! Record producers turn one parsed [`File`] into feature records.
//!
//! Every producer follows the same walk: file level features are computed
//! once, copied per piece, then copied once more per visited line. The walk
//! itself lives in [`RecordProducer::produce`]; implementations only fill
//! their slots at each level.

pub mod git;
pub mod xml;

pub use git::{GitProducer, GIT_SCHEMA};
pub use xml::{XmlProducer, XML_SCHEMA};

use crate::model::{File, Line, Piece};
use crate::schema::{FeatureSchema, Record, RecordType};
use crate::vocabulary::VocabularyRegistry;

pub trait RecordProducer: Send + Sync {
    fn record_type(&self) -> RecordType;

    fn schema(&self) -> &'static FeatureSchema;

    fn file_features(&self, _file: &File, _record: &mut Record, _vocabulary: &VocabularyRegistry) {}

    fn piece_features(&self, _piece: &Piece, _record: &mut Record, _vocabulary: &VocabularyRegistry) {}

    fn line_features(&self, line: &Line, record: &mut Record, vocabulary: &VocabularyRegistry);

    /// Emits one record per line of `piece` starting at `visit_from`.
    ///
    /// Producers that need context from earlier lines of the piece override
    /// this and scan the whole piece, emitting only the visited tail.
    fn piece_records(
        &self,
        piece: &Piece,
        visit_from: usize,
        piece_record: &Record,
        vocabulary: &VocabularyRegistry,
    ) -> Vec<Record> {
        piece.lines[visit_from..]
            .iter()
            .map(|line| {
                let mut record = piece_record.clone();
                self.line_features(line, &mut record, vocabulary);
                record
            })
            .collect()
    }

    /// Walks `file` and returns its records in line order.
    ///
    /// With `only_last_line` each piece contributes at most its final line,
    /// the line a review comment is anchored to. A piece whose first visited
    /// line looks binary contributes nothing.
    fn produce(&self, file: &File, only_last_line: bool, vocabulary: &VocabularyRegistry) -> Vec<Record> {
        let mut file_record = self.schema().base();
        self.file_features(file, &mut file_record, vocabulary);

        let mut records = Vec::new();
        for piece in &file.pieces {
            let mut piece_record = file_record.clone();
            self.piece_features(piece, &mut piece_record, vocabulary);

            let visit_from = if only_last_line { piece.lines.len().saturating_sub(1) } else { 0 };
            match piece.lines.get(visit_from) {
                Some(first) if !first.looks_binary() => {}
                _ => continue,
            }
            records.extend(self.piece_records(piece, visit_from, &piece_record, vocabulary));
        }
        records
    }
}
