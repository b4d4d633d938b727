mod common;

use std::path::Path;

use common::{source_file, tree, ScriptedEngine};
use mp3_library_converter::analyzers::duplicate::MemberReport;
use mp3_library_converter::{DuplicateFinder, TagExtractor};
use pretty_assertions::assert_eq;

fn finder(engine: &ScriptedEngine) -> DuplicateFinder {
    DuplicateFinder::new(TagExtractor::from_factory(engine))
}

fn music(root: &Path, engine: &ScriptedEngine) {
    let a = source_file(root, "a.flac");
    let b = source_file(root, "b.mp3");
    let c = source_file(root, "c.flac");
    source_file(root, "d.wav");
    engine.track(&a, "Band", "Album", "Song", "1", "FLAC");
    engine.track(&b, "band", "Other Album", "SONG", "4", "MPEG-1 Layer 3 (MP3)");
    engine.track(&c, "Band", "Album", "Other", "2", "FLAC");
}

#[test]
fn test_groups_tracks_by_title_and_artist() {
    let src = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new();
    music(src.path(), &engine);

    let report = finder(&engine)
        .find_duplicates(src.path(), "/mp3", None, false)
        .unwrap();

    assert_eq!(report.files_scanned, 4);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(report.groups.len(), 1);

    let group = &report.groups[0];
    assert_eq!(group.key, "songband");
    assert_eq!(
        group.members,
        vec![
            MemberReport::Resolved {
                source: src.path().join("a.flac"),
                destination: Path::new("/mp3/Band/Song-30c.mp3").to_path_buf(),
                suggestion: format!("rm '{}'", src.path().join("a.flac").display()),
            },
            MemberReport::Resolved {
                source: src.path().join("b.mp3"),
                destination: Path::new("/mp3/band/SONG-1cc.mp3").to_path_buf(),
                suggestion: format!("rm '{}'", src.path().join("b.mp3").display()),
            },
        ]
    );
}

#[test]
fn test_quarantine_suggestions_move_and_remove_copy() {
    let src = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new();
    music(src.path(), &engine);

    let report = finder(&engine)
        .find_duplicates(src.path(), "/mp3", Some(Path::new("/dupes")), false)
        .unwrap();

    let suggestions: Vec<String> = report.groups[0]
        .members
        .iter()
        .map(|member| match member {
            MemberReport::Resolved { suggestion, .. } => suggestion.clone(),
            other => panic!("unexpected member: {:?}", other),
        })
        .collect();
    assert_eq!(
        suggestions,
        vec![
            format!(
                "mv '{}' '/dupes'/ && rm -f '/mp3/Band/Song-30c.mp3'",
                src.path().join("a.flac").display()
            ),
            format!(
                "mv '{}' '/dupes'/ && rm -f '/mp3/band/SONG-1cc.mp3'",
                src.path().join("b.mp3").display()
            ),
        ]
    );
}

#[test]
fn test_scan_modifies_nothing() {
    let src = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let dest = scratch.path().join("library");
    let quarantine = scratch.path().join("dupes");
    let engine = ScriptedEngine::new();
    music(src.path(), &engine);
    let before = tree(src.path());

    finder(&engine)
        .find_duplicates(src.path(), &dest, Some(&quarantine), false)
        .unwrap();

    assert_eq!(tree(src.path()), before);
    assert!(!dest.exists());
    assert!(!quarantine.exists());
    assert!(engine.encoded().is_empty());
}

#[test]
fn test_no_duplicates_gives_empty_report() {
    let src = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new();
    let only = source_file(src.path(), "only.flac");
    engine.track(&only, "Band", "Album", "Song", "1", "FLAC");

    let report = finder(&engine)
        .find_duplicates(src.path(), "/mp3", None, false)
        .unwrap();

    assert_eq!(report.files_scanned, 1);
    assert!(report.groups.is_empty());
}

#[test]
fn test_missing_root_is_an_error() {
    let scratch = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new();

    assert!(finder(&engine)
        .find_duplicates(scratch.path().join("missing"), "/mp3", None, false)
        .is_err());
}
