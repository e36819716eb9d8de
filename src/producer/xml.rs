// src/producer/xml.rs

//! Lexical features of XML lines.
//!
//! The scanner works on diff fragments rather than documents, so it never
//! validates anything: it counts tag, attribute and comment delimiters and
//! carries open-tag and open-comment state from one line of a piece to the
//! next. Slots of the embedded GIT schema are left for the pipeline to fill
//! from the matching GIT record.

use super::git::GIT_SCHEMA;
use super::RecordProducer;
use crate::model::{Line, Piece};
use crate::schema::{FeatureDef, FeatureSchema, Record, RecordType};
use crate::vocabulary::VocabularyRegistry;

pub static XML_SCHEMA: FeatureSchema = FeatureSchema::extending(
    &GIT_SCHEMA,
    &[
        FeatureDef::numeric("XML_OPENED_TAGS"),
        FeatureDef::numeric("XML_CLOSED_TAGS"),
        FeatureDef::numeric("XML_ATTRIBUTES"),
        FeatureDef::numeric("XML_OPEN_TAGS_DEPTH"),
        FeatureDef::numeric("XML_COMMENT_OPENERS"),
        FeatureDef::numeric("XML_COMMENT_CLOSERS"),
        FeatureDef::numeric("XML_IS_COMMENT"),
        FeatureDef::numeric("XML_NESTING_LEVEL"),
        FeatureDef::vocabulary("V_XML_TAG"),
    ],
);

const XML_OPENED_TAGS: usize = 5;
const XML_CLOSED_TAGS: usize = 6;
const XML_ATTRIBUTES: usize = 7;
const XML_OPEN_TAGS_DEPTH: usize = 8;
const XML_COMMENT_OPENERS: usize = 9;
const XML_COMMENT_CLOSERS: usize = 10;
const XML_IS_COMMENT: usize = 11;
const XML_NESTING_LEVEL: usize = 12;
const V_XML_TAG: usize = 13;

/// Value of `V_XML_TAG` on lines without an opening tag
const NO_TAG: i64 = -1;

#[derive(Debug, Default, Clone, Copy)]
pub struct XmlProducer;

impl RecordProducer for XmlProducer {
    fn record_type(&self) -> RecordType {
        RecordType::XML
    }

    fn schema(&self) -> &'static FeatureSchema {
        &XML_SCHEMA
    }

    fn line_features(&self, line: &Line, record: &mut Record, vocabulary: &VocabularyRegistry) {
        XmlScanner::default().scan(&line.text, record, vocabulary);
    }

    fn piece_records(
        &self,
        piece: &Piece,
        visit_from: usize,
        piece_record: &Record,
        vocabulary: &VocabularyRegistry,
    ) -> Vec<Record> {
        let mut scanner = XmlScanner::default();
        let mut records = Vec::new();
        for (i, line) in piece.lines.iter().enumerate() {
            if i < visit_from {
                scanner.advance(&line.text);
                continue;
            }
            let mut record = piece_record.clone();
            scanner.scan(&line.text, &mut record, vocabulary);
            records.push(record);
        }
        records
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct LineCounts {
    opened_tags: i64,
    closed_tags: i64,
    attributes: i64,
    comment_openers: i64,
    comment_closers: i64,
    is_comment: bool,
    first_tag: Option<String>,
}

/// State carried across the lines of one piece
#[derive(Debug, Default)]
struct XmlScanner {
    in_tag: bool,
    in_comment: bool,
    open_tags: i64,
    indent: usize,
    nesting_level: i64,
}

impl XmlScanner {
    fn scan(&mut self, text: &str, record: &mut Record, vocabulary: &VocabularyRegistry) {
        let counts = self.advance(text);
        record.set(XML_OPENED_TAGS, counts.opened_tags);
        record.set(XML_CLOSED_TAGS, counts.closed_tags);
        record.set(XML_ATTRIBUTES, counts.attributes);
        record.set(XML_OPEN_TAGS_DEPTH, self.open_tags);
        record.set(XML_COMMENT_OPENERS, counts.comment_openers);
        record.set(XML_COMMENT_CLOSERS, counts.comment_closers);
        record.set(XML_IS_COMMENT, if counts.is_comment { 1 } else { -1 });
        record.set(XML_NESTING_LEVEL, self.nesting_level);
        match counts.first_tag {
            Some(tag) => vocabulary.intern_and_set(V_XML_TAG, &tag, record),
            None => record.set(V_XML_TAG, NO_TAG),
        }
    }

    fn advance(&mut self, text: &str) -> LineCounts {
        let mut counts = LineCounts::default();
        let started_in_comment = self.in_comment;
        self.update_nesting(text);

        let chars: Vec<char> = text.chars().collect();
        let mut quote: Option<char> = None;
        let mut i = 0;
        while i < chars.len() {
            let rest = &chars[i..];
            if self.in_comment {
                if rest.starts_with(&['-', '-', '>']) {
                    counts.comment_closers += 1;
                    self.in_comment = false;
                    i += 3;
                } else {
                    i += 1;
                }
                continue;
            }
            if self.in_tag {
                match (quote, rest[0]) {
                    (Some(open), c) if c == open => quote = None,
                    (Some(_), _) => {}
                    (None, '"') | (None, '\'') => quote = Some(rest[0]),
                    (None, '=') => counts.attributes += 1,
                    (None, '/') if rest.get(1) == Some(&'>') => {
                        counts.closed_tags += 1;
                        self.in_tag = false;
                        i += 1;
                    }
                    (None, '>') => self.in_tag = false,
                    _ => {}
                }
                i += 1;
                continue;
            }
            if rest.starts_with(&['<', '!', '-', '-']) {
                counts.comment_openers += 1;
                self.in_comment = true;
                i += 4;
                continue;
            }
            if rest[0] == '<' {
                match rest.get(1) {
                    Some('/') => {
                        counts.closed_tags += 1;
                        i = skip_past(&chars, i, '>');
                    }
                    Some('?') | Some('!') => i = skip_past(&chars, i, '>'),
                    _ => {
                        let name: String = rest[1..]
                            .iter()
                            .take_while(|c| !c.is_whitespace() && **c != '>' && **c != '/')
                            .collect();
                        i += 1 + name.chars().count();
                        if !name.is_empty() {
                            counts.opened_tags += 1;
                            counts.first_tag.get_or_insert(name);
                        }
                        self.in_tag = true;
                    }
                }
                continue;
            }
            i += 1;
        }

        self.open_tags = (self.open_tags + counts.opened_tags - counts.closed_tags).max(0);
        let has_comment = started_in_comment || counts.comment_openers > 0;
        counts.is_comment = has_comment && counts.opened_tags == 0 && counts.closed_tags == 0;
        counts
    }

    fn update_nesting(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let indent = text.chars().take_while(|c| c.is_whitespace()).count();
        if indent > self.indent {
            self.nesting_level += 1;
        } else if indent < self.indent {
            self.nesting_level -= 1;
        }
        self.indent = indent;
    }
}

/// Index just after the next `end` at or after `from`, or the end of line
fn skip_past(chars: &[char], from: usize, end: char) -> usize {
    chars[from..]
        .iter()
        .position(|&c| c == end)
        .map_or(chars.len(), |offset| from + offset + 1)
}
