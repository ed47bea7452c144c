//! Recipe file integration tests
//!
//! - save, load and independent hash recomputation
//! - tamper detection
//! - files from a different configuration
//! - file to controller and back

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

mod common;

use common::{context, context_from, sample_recipe, without_unmapped, SAMPLE};
use depo_comlink::RegisterSimulator;
use errors::{DepoErrorTrait, ErrorCategory};
use recipesrv::file::RecipeFileMetadata;
use recipesrv::{FileError, Fingerprint};
use tokio_util::sync::CancellationToken;

/// Recompute the body hash from the file text alone
fn recompute_body_hash(text: &str) -> (RecipeFileMetadata, Fingerprint) {
    let text = text.trim_start_matches('\u{feff}');
    let (header, body) = text.split_once('\n').unwrap();
    let metadata = RecipeFileMetadata::parse(header.trim_end_matches('\r')).unwrap();
    (metadata, Fingerprint::of(body.replace("\r\n", "\n").as_bytes()))
}

#[test]
fn test_saved_file_loads_and_hash_recomputes() {
    let ctx = context();
    let store = ctx.file_store();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deposition.csv");
    let recipe = sample_recipe(&ctx);

    store.save(&path, &recipe).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("\u{feff}#DEPO-RECIPE;1;"));

    let (metadata, body_hash) = recompute_body_hash(&text);
    assert_eq!(metadata.rows, recipe.len());
    assert_eq!(metadata.body, body_hash);
    assert_eq!(metadata.schema, store.codec().schema_fingerprint());
    assert_eq!(metadata.actions, store.codec().action_fingerprint());

    let loaded = store.load(&path).unwrap();
    assert_eq!(loaded.recipe, recipe);
}

#[test]
fn test_every_single_byte_edit_in_body_is_detected() {
    let ctx = context();
    let codec = ctx.file_codec();
    let text = codec.serialize(&sample_recipe(&ctx)).unwrap();
    let body_start = text.find('\n').unwrap() + 1;

    for index in body_start..text.len() {
        let original = text.as_bytes()[index];
        let replacement = if original == b'7' { b'8' } else { b'7' };
        let mut bytes = text.clone().into_bytes();
        bytes[index] = replacement;
        let Ok(tampered) = String::from_utf8(bytes) else {
            continue;
        };

        let errors = codec
            .deserialize(&tampered)
            .expect_err("edited body must be rejected");
        assert!(
            errors.errors().iter().all(FileError::is_integrity),
            "byte {index}: {errors}"
        );
    }
}

#[test]
fn test_reordered_rows_are_detected() {
    let ctx = context();
    let codec = ctx.file_codec();
    let text = codec.serialize(&sample_recipe(&ctx)).unwrap();

    let mut lines: Vec<&str> = text.lines().collect();
    lines.swap(2, 3);
    let tampered = lines.join("\n") + "\n";

    let errors = codec.deserialize(&tampered).unwrap_err();
    assert!(matches!(
        errors.errors(),
        [FileError::BodyHashMismatch { .. }]
    ));
    assert_eq!(errors.category(), ErrorCategory::Integrity);
}

#[test]
fn test_file_from_other_configuration_is_incompatible() {
    let ctx = context();
    let text = ctx.file_codec().serialize(&sample_recipe(&ctx)).unwrap();

    // Same columns, but the temperature step now drives a different heater
    let other = context_from(&SAMPLE.replace("target: heater_1", "target: heater_2").replace(
        "  - heater_1\n",
        "  - heater_1\n  - heater_2\n",
    ));
    let errors = other.file_codec().deserialize(&text).unwrap_err();
    assert!(matches!(
        errors.errors(),
        [FileError::ActionsMismatch { .. }]
    ));
    assert_eq!(errors.category(), ErrorCategory::Incompatible);

    // Column type change alters the schema fingerprint
    let other = context_from(&SAMPLE.replace(
        "{ key: comment, code: NOTE, ordinal: 6, type: string }",
        "{ key: comment, code: NOTE, ordinal: 6, type: int16 }",
    ));
    let errors = other.file_codec().deserialize(&text).unwrap_err();
    assert!(errors
        .errors()
        .iter()
        .any(|e| matches!(e, FileError::SchemaMismatch { .. })));
}

#[tokio::test]
async fn test_file_to_controller_and_back() {
    let ctx = context();
    let store = ctx.file_store();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.csv");
    let fetched = dir.path().join("fetched.csv");
    store.save(&source, &sample_recipe(&ctx)).unwrap();

    let sim = RegisterSimulator::new();
    let mut service = ctx.sync_service(sim).unwrap();
    let token = CancellationToken::new();

    let loaded = store.load(&source).unwrap();
    service.send(&loaded.recipe, &token).await.unwrap();
    let received = service.receive(&token).await.unwrap();
    store.save(&fetched, &received).unwrap();

    let reloaded = store.load(&fetched).unwrap();
    assert_eq!(reloaded.recipe, without_unmapped(&ctx, &loaded.recipe));
}
