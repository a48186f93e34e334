use super::*;
use hostbridge_core::SessionRegistry;
use tempfile::TempDir;

fn round_trip(original: &str, modified: &str) {
    let patches = make_patch(original, modified);
    let text = patch_to_text(&patches);
    let parsed = patch_from_text(&text).unwrap();
    assert_eq!(parsed, patches, "encoding did not round-trip");

    let (result, applied) = apply_patch(&parsed, original);
    assert!(applied.iter().all(|ok| *ok), "some hunks failed to apply");
    assert_eq!(result, modified);
}

#[test]
fn test_round_trip_single_change() {
    round_trip("alpha\nbeta\n", "alpha\ngamma\n");
}

#[test]
fn test_round_trip_insertion_and_deletion() {
    round_trip("a\nb\nc\nd\n", "a\nc\nd\ne\n");
}

#[test]
fn test_round_trip_no_trailing_newline() {
    round_trip("one\ntwo", "one\nthree");
    round_trip("one\ntwo\n", "one\ntwo\nthree");
    round_trip("one\ntwo", "one\ntwo\n");
}

#[test]
fn test_round_trip_empty_sides() {
    round_trip("", "brand new\ncontent\n");
    round_trip("old\ncontent\n", "");
}

#[test]
fn test_round_trip_distant_changes_make_separate_hunks() {
    let original: String = (0..40).map(|i| format!("line {i}\n")).collect();
    let mut changed_lines: Vec<String> = original.lines().map(|l| format!("{l}\n")).collect();
    changed_lines[2] = "changed near top\n".to_string();
    changed_lines[35] = "changed near bottom\n".to_string();
    let modified: String = changed_lines.concat();

    let patches = make_patch(&original, &modified);
    assert_eq!(patches.len(), 2);
    round_trip(&original, &modified);
}

#[test]
fn test_diff_is_character_level() {
    // A one-character insertion: the walk keeps the shared characters on
    // both sides of it as Equal runs instead of replacing the whole line.
    let segments = diff_chars("alpha\nbeta\n", "alpha\nbesta\n");
    assert!(segments
        .iter()
        .any(|(kind, text)| *kind == EditKind::Insert && text == "s"));
    assert!(!segments
        .iter()
        .any(|(kind, text)| *kind == EditKind::Delete && !text.is_empty()));
}

#[test]
fn test_single_char_edit_dirties_only_its_line() {
    let original = "aaa\nbbb\nccc\nddd\neee\nfff\nggg\nhhh\niii\n";
    let modified = "aaa\nbbb\nccc\ndXd\neee\nfff\nggg\nhhh\niii\n";
    let patches = make_patch(original, modified);

    assert_eq!(patches.len(), 1);
    let removed: Vec<&str> = patches[0]
        .lines
        .iter()
        .filter(|l| l.kind == LineKind::Remove)
        .map(|l| l.text.as_str())
        .collect();
    assert_eq!(removed, vec!["ddd\n"]);
    round_trip(original, modified);
}

#[test]
fn test_round_trip_beyond_edit_budget() {
    // Completely unrelated texts blow the character-walk budget and fall
    // back to a wholesale replacement, which must still round-trip.
    let original: String = (0..800).map(|i| format!("alpha {i}\n")).collect();
    let modified: String = (0..800).map(|i| format!("omega {i}\n")).collect();
    round_trip(&original, &modified);
}

#[test]
fn test_identical_inputs_produce_no_hunks() {
    assert!(make_patch("same\n", "same\n").is_empty());
    assert_eq!(patch_to_text(&[]), "");
    assert!(patch_from_text("").unwrap().is_empty());
}

#[test]
fn test_apply_with_fuzz_offset() {
    let original = "a\nb\nc\nTARGET\nd\ne\nf\n";
    let modified = "a\nb\nc\nREPLACED\nd\ne\nf\n";
    let patches = make_patch(original, modified);

    // Two lines inserted at the top shift every anchor by two.
    let drifted = "x\ny\na\nb\nc\nTARGET\nd\ne\nf\n";
    let (result, applied) = apply_patch(&patches, drifted);
    assert_eq!(applied, vec![true]);
    assert_eq!(result, "x\ny\na\nb\nc\nREPLACED\nd\ne\nf\n");
}

#[test]
fn test_apply_beyond_fuzz_is_skipped() {
    let original = "a\nb\nc\nTARGET\nd\ne\nf\n";
    let modified = "a\nb\nc\nREPLACED\nd\ne\nf\n";
    let patches = make_patch(original, modified);

    // Ten lines of drift exceeds the fuzz window.
    let drifted: String = (0..10)
        .map(|i| format!("pad {i}\n"))
        .chain(["a\nb\nc\nTARGET\nd\ne\nf\n".to_string()])
        .collect();
    let (result, applied) = apply_patch(&patches, &drifted);
    assert_eq!(applied, vec![false]);
    assert_eq!(result, drifted);
}

#[test]
fn test_apply_missing_anchor_is_skipped() {
    let patches = make_patch("a\nb\nc\n", "a\nX\nc\n");
    let (result, applied) = apply_patch(&patches, "completely\ndifferent\n");
    assert_eq!(applied, vec![false]);
    assert_eq!(result, "completely\ndifferent\n");
}

#[test]
fn test_patch_from_text_rejects_garbage() {
    assert!(patch_from_text("@@ broken header\n x\n").is_err());
    assert!(patch_from_text("no header at all\n").is_err());
}

#[test]
fn test_parse_range_without_count() {
    assert_eq!(parse_range("7").unwrap(), (7, 1));
    assert_eq!(parse_range("7,0").unwrap(), (7, 0));
    assert!(parse_range("x,1").is_err());
}

async fn engine() -> (DiffEngine, Arc<FileOperations>, Uuid, TempDir) {
    let registry = Arc::new(SessionRegistry::new());
    let files = Arc::new(FileOperations::new(Arc::clone(&registry)));
    let engine = DiffEngine::new(Arc::clone(&registry), Arc::clone(&files));

    let dir = tempfile::tempdir().unwrap();
    let view = registry.create().await;
    registry
        .set_working_dir(view.id, dir.path().to_str().unwrap())
        .await
        .unwrap();

    (engine, files, view.id, dir)
}

#[tokio::test]
async fn test_generate_and_apply_inline() {
    let (engine, _files, id, _dir) = engine().await;

    let request = DiffRequest {
        original: "alpha\nbeta\n".into(),
        modified: "alpha\ngamma\n".into(),
        ..Default::default()
    };
    let patches = engine.generate(id, &request).await.unwrap();
    assert!(patches.contains("-beta"));
    assert!(patches.contains("+gamma"));

    let result = engine
        .apply(
            id,
            &PatchRequest {
                file_path: String::new(),
                original: "alpha\nbeta\n".into(),
                patches,
            },
        )
        .await
        .unwrap();
    assert_eq!(result, "alpha\ngamma\n");
}

#[tokio::test]
async fn test_generate_from_files_and_write_back() {
    let (engine, files, id, _dir) = engine().await;

    files.create(id, "old.txt", "x\ny\n").await.unwrap();
    files.create(id, "new.txt", "x\nz\n").await.unwrap();

    let patches = engine
        .generate(
            id,
            &DiffRequest {
                original_path: "old.txt".into(),
                modified_path: "new.txt".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let result = engine
        .apply(
            id,
            &PatchRequest {
                file_path: "old.txt".into(),
                original: "x\ny\n".into(),
                patches,
            },
        )
        .await
        .unwrap();
    assert_eq!(result, "x\nz\n");
    assert_eq!(files.read(id, "old.txt").await.unwrap(), "x\nz\n");
}

#[tokio::test]
async fn test_apply_invalid_patch_text() {
    let (engine, _files, id, _dir) = engine().await;

    let err = engine
        .apply(
            id,
            &PatchRequest {
                file_path: String::new(),
                original: "a\n".into(),
                patches: "not a patch\n".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}
