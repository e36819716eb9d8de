use diff_features::producer::GIT_SCHEMA;
use diff_features::{
    AnalysisPipeline, AnalyzerError, PipelineConfig, PipelineState, PullRequest, RawComment, RecordType,
};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

fn raw_comments() -> Vec<RawComment> {
    let mut rcs = Vec::new();
    for i in 0..120 {
        let (path, hunk) = match i % 6 {
            0 => ("src/app.py", "@@ -1,3 +1,4 @@ def main():\n context\n-old\n+new line\n".to_string()),
            1 => ("res/layout/main.xml", "@@ -4,2 +4,3 @@\n <root>\n+  <child a=\"1\"/>\n".to_string()),
            2 => ("scripts/run.sh", format!("@@ -{0},1 +{0},2 @@\n echo\n+echo {0}\n", i)),
            // malformed: no hunk header, skipped
            3 => ("README", "just some text".to_string()),
            // binary last line, skipped
            4 => ("logo.png", "@@ -1,1 +1,1 @@\n+\u{89}PNG\u{0}\n".to_string()),
            _ => ("wrapped.js", "b'@@ -1,1 +1,1 @@\\n+let x = 1;'".to_string()),
        };
        rcs.push(RawComment { id: i + 1, path: path.to_string(), diff_hunk: hunk });
    }
    rcs
}

fn file_diff(path: &str, body: &str) -> String {
    format!("diff --git a/{path} b/{path}\nindex 1111111..2222222 100644\n--- a/{path}\n+++ b/{path}\n{body}")
}

fn pull_requests() -> Vec<PullRequest> {
    let mut prs = Vec::new();
    for i in 0..30 {
        let diff = if i % 10 == 9 {
            (0..25).map(|f| file_diff(&format!("big/{f}.py"), "@@ -1,1 +1,1 @@\n+x\n")).collect()
        } else {
            file_diff("lib/util.py", "@@ -1,2 +1,3 @@ class A:\n keep\n-drop\n+add\n+more\n")
                + &file_diff("res/values.xml", "@@ -2,1 +2,2 @@\n <a>\n+<b x=\"1\"></b>\n")
        };
        prs.push(PullRequest { id: 1000 + i, state: "closed".into(), diff });
    }
    prs
}

fn config(dir: &Path, threads: usize) -> PipelineConfig {
    PipelineConfig {
        output_dir: dir.to_path_buf(),
        threads,
        shuffle_seed: Some(42),
        ..Default::default()
    }
}

fn data_lines(path: &Path) -> (String, Vec<String>) {
    let content = fs::read_to_string(path).unwrap();
    let mut lines = content.lines().map(str::to_string);
    let header = lines.next().unwrap();
    (header, lines.collect())
}

#[test]
fn raw_comment_records_are_counted_and_labeled() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = AnalysisPipeline::new(config(dir.path(), 1)).unwrap();
    let rcs = raw_comments();

    let total = pipeline.analyze_items(&rcs).unwrap();
    // categories 3 and 4 are skipped
    assert_eq!(total, 80);
    assert_eq!(pipeline.state(), PipelineState::Running);

    let summaries = pipeline.finalize(0.75).unwrap();
    assert_eq!(pipeline.state(), PipelineState::Finalized);
    let git = summaries.iter().find(|s| s.record_type == RecordType::GIT).unwrap();
    assert_eq!(git.rows, 80);
    assert_eq!(git.train_rows, 60);
    assert_eq!(git.test_rows, 20);

    let xml = summaries.iter().find(|s| s.record_type == RecordType::XML).unwrap();
    assert_eq!(xml.rows, 20);

    let (_, train) = data_lines(&git.train_path);
    let (_, test) = data_lines(&git.test_path);
    let labels: HashSet<i64> = train
        .iter()
        .chain(&test)
        .map(|line| line.split(',').next().unwrap().parse().unwrap())
        .collect();
    let expected: HashSet<i64> = rcs.iter().filter(|rc| matches!(rc.id % 6, 1 | 2 | 3 | 0)).map(|rc| rc.id).collect();
    assert_eq!(labels, expected);
}

#[test]
fn total_is_independent_of_thread_count() {
    let rcs = raw_comments();
    let prs = pull_requests();
    let mut totals = Vec::new();
    for threads in [1, 3, 8] {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = AnalysisPipeline::new(config(dir.path(), threads)).unwrap();
        let rc_total = pipeline.analyze_items(&rcs).unwrap();
        let pr_total = pipeline.analyze_items(&prs).unwrap();
        let summaries = pipeline.finalize(0.5).unwrap();
        let rows: Vec<usize> = summaries.iter().map(|s| s.rows).collect();
        totals.push((rc_total, pr_total, rows));
    }
    assert!(totals.windows(2).all(|pair| pair[0] == pair[1]), "{:?}", totals);
    // 27 regular pull requests, 4 records from the .py file and 2 from the .xml one
    assert_eq!(totals[0].1, 27 * 6);
}

#[test]
fn splits_are_a_permutation_of_the_raw_dump() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = AnalysisPipeline::new(config(dir.path(), 4)).unwrap();
    pipeline.analyze_items(&pull_requests()).unwrap();
    let summaries = pipeline.finalize(0.8).unwrap();
    let git = summaries.iter().find(|s| s.record_type == RecordType::GIT).unwrap();

    let raw = fs::read_to_string(pipeline.storage().records_path(RecordType::GIT)).unwrap();
    let mut raw: Vec<String> = raw.lines().map(str::to_string).collect();

    let (train_header, train) = data_lines(&git.train_path);
    let (test_header, test) = data_lines(&git.test_path);
    let names = GIT_SCHEMA.names().join(",");
    assert_eq!(train_header, format!("{},{},{}", train.len(), GIT_SCHEMA.len(), names));
    assert_eq!(test_header, format!("{},{},{}", test.len(), GIT_SCHEMA.len(), names));
    assert_eq!(train.len(), (raw.len() as f64 * 0.8).floor() as usize);

    let mut split: Vec<String> = train.into_iter().chain(test).collect();
    split.sort();
    raw.sort();
    assert_eq!(split, raw);
    for line in &raw {
        assert_eq!(line.split(',').count(), GIT_SCHEMA.len());
        assert!(line.starts_with("0,"), "pull request records are unlabeled: {}", line);
    }
}

#[test]
fn vocabulary_follows_first_appearance_on_one_thread() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = AnalysisPipeline::new(config(dir.path(), 1)).unwrap();
    pipeline.analyze_items(&raw_comments()).unwrap();
    pipeline.finalize(0.5).unwrap();

    let vocabulary = fs::read_to_string(dir.path().join("V_GIT_FILE_vocabulary.csv")).unwrap();
    // skipped hunks still intern before being rejected, malformed ones never parse
    assert_eq!(
        vocabulary.lines().collect::<Vec<_>>(),
        vec!["src/app.py", "res/layout/main.xml", "scripts/run.sh", "logo.png", "wrapped.js"]
    );
    let tags = fs::read_to_string(dir.path().join("V_XML_TAG_vocabulary.csv")).unwrap();
    assert_eq!(tags, "child\n");
}

#[test]
fn buffered_and_chunked_flushing_agree() {
    let prs = pull_requests();
    let mut rows = Vec::new();
    for chunked_flush in [true, false] {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig { chunked_flush, ..config(dir.path(), 2) };
        let mut pipeline = AnalysisPipeline::new(config).unwrap();
        let total = pipeline.analyze_items(&prs).unwrap();
        let accumulator = pipeline.accumulator(RecordType::GIT).unwrap();
        if chunked_flush {
            assert_eq!(accumulator.buffered(), 0);
            assert_eq!(accumulator.flushed(), total);
        } else {
            assert_eq!(accumulator.buffered(), total);
            assert_eq!(accumulator.flushed(), 0);
        }
        let summaries = pipeline.finalize(1.0).unwrap();
        rows.push(summaries.iter().map(|s| (s.rows, s.train_rows, s.test_rows)).collect::<Vec<_>>());
    }
    assert_eq!(rows[0], rows[1]);
}

#[test]
fn clean_starts_a_fresh_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = AnalysisPipeline::new(config(dir.path(), 2)).unwrap();
    pipeline.analyze_items(&raw_comments()).unwrap();
    pipeline.finalize(0.5).unwrap();
    pipeline.clean();

    let malformed: Vec<RawComment> = raw_comments().into_iter().skip(3).take(1).collect();
    assert_eq!(pipeline.analyze_items(&malformed).unwrap(), 0);
    let rcs: Vec<RawComment> = raw_comments().into_iter().take(1).collect();
    assert_eq!(pipeline.analyze_items(&rcs).unwrap(), 1);
    let summaries = pipeline.finalize(0.0).unwrap();
    let git = summaries.iter().find(|s| s.record_type == RecordType::GIT).unwrap();
    assert_eq!((git.rows, git.train_rows, git.test_rows), (1, 0, 1));
    let vocabulary = fs::read_to_string(dir.path().join("V_GIT_FILE_vocabulary.csv")).unwrap();
    assert_eq!(vocabulary, "src/app.py\n");
}

mod custom_producer {
    use super::*;
    use diff_features::producer::RecordProducer;
    use diff_features::{FeatureDef, FeatureSchema, FileType, Line, Record, VocabularyRegistry};

    static PY_SCHEMA: FeatureSchema =
        FeatureSchema::extending(&GIT_SCHEMA, &[FeatureDef::numeric("PY_INDENT")]);

    struct IndentProducer;

    impl RecordProducer for IndentProducer {
        fn record_type(&self) -> RecordType {
            RecordType("PY")
        }

        fn schema(&self) -> &'static FeatureSchema {
            &PY_SCHEMA
        }

        fn line_features(&self, line: &Line, record: &mut Record, _vocabulary: &VocabularyRegistry) {
            let indent = line.text.chars().take_while(|c| *c == ' ').count();
            record.set(GIT_SCHEMA.len(), indent as i64);
        }
    }

    #[test]
    fn registered_producer_gets_its_own_split() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = AnalysisPipeline::builder(config(dir.path(), 2))
            .register(FileType::Python, IndentProducer)
            .build()
            .unwrap();
        assert_eq!(pipeline.record_types(), vec![RecordType::GIT, RecordType("PY")]);

        let rc = RawComment {
            id: 9,
            path: "pkg/mod.py".into(),
            diff_hunk: "@@ -1,2 +1,2 @@\n def f():\n+    return 1\n".into(),
        };
        assert_eq!(pipeline.analyze_items(&[rc]).unwrap(), 1);
        let summaries = pipeline.finalize(1.0).unwrap();
        let py = summaries.iter().find(|s| s.record_type == RecordType("PY")).unwrap();
        assert_eq!(py.rows, 1);

        let (header, rows) = data_lines(&py.train_path);
        assert_eq!(header, format!("1,6,{},PY_INDENT", GIT_SCHEMA.names().join(",")));
        // label and GIT columns come from the GIT record
        assert_eq!(rows, vec!["9,1,1,12,0,4".to_string()]);
    }
}

mod failures {
    use super::*;
    use diff_features::producer::RecordProducer;
    use diff_features::{FeatureDef, FeatureSchema, FileType, Line, Record, VocabularyRegistry};

    static SH_SCHEMA: FeatureSchema = FeatureSchema::extending(&GIT_SCHEMA, &[FeatureDef::numeric("SH_WORDS")]);

    /// Panics on a `boom` line, counts words otherwise
    struct FragileProducer;

    impl RecordProducer for FragileProducer {
        fn record_type(&self) -> RecordType {
            RecordType("SH")
        }

        fn schema(&self) -> &'static FeatureSchema {
            &SH_SCHEMA
        }

        fn line_features(&self, line: &Line, record: &mut Record, _vocabulary: &VocabularyRegistry) {
            if line.text == "boom" {
                panic!("cannot tokenize {:?}", line.text);
            }
            record.set(GIT_SCHEMA.len(), line.text.split_whitespace().count() as i64);
        }
    }

    fn scripts() -> Vec<RawComment> {
        (0..10)
            .map(|i| RawComment {
                id: i + 1,
                path: format!("bin/step{i}.sh"),
                diff_hunk: if i == 6 {
                    "@@ -1,1 +1,1 @@\n+boom\n".to_string()
                } else {
                    format!("@@ -1,1 +1,2 @@\n set -e\n+echo step {i}\n")
                },
            })
            .collect()
    }

    #[test]
    fn panicking_item_is_skipped_and_the_run_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = AnalysisPipeline::builder(config(dir.path(), 2))
            .register(FileType::ShScript, FragileProducer)
            .build()
            .unwrap();

        assert_eq!(pipeline.analyze_items(&scripts()).unwrap(), 9);
        let summaries = pipeline.finalize(0.5).unwrap();
        for summary in summaries.iter().filter(|s| s.record_type != RecordType::XML) {
            assert_eq!(summary.rows, 9, "{}", summary.record_type);
            assert_eq!(summary.train_rows + summary.test_rows, 9);
        }

        let sh = summaries.iter().find(|s| s.record_type == RecordType("SH")).unwrap();
        let (_, train) = data_lines(&sh.train_path);
        let (_, test) = data_lines(&sh.test_path);
        let labels: HashSet<i64> = train
            .iter()
            .chain(&test)
            .map(|line| line.split(',').next().unwrap().parse().unwrap())
            .collect();
        assert!(!labels.contains(&7));
        assert_eq!(labels.len(), 9);
    }

    #[test]
    fn writer_failure_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = AnalysisPipeline::new(config(dir.path(), 2)).unwrap();
        fs::create_dir_all(pipeline.storage().records_path(RecordType::GIT)).unwrap();

        let err = pipeline.analyze_items(&raw_comments()).unwrap_err();
        assert!(matches!(err, AnalyzerError::Io { .. } | AnalyzerError::Writer { .. }), "{}", err);
        assert!(pipeline.finalize(0.5).is_err());
    }
}
