//! Artifact persistence and corruption handling.

mod common;

use maize_yield::io::{DeserializeError, HEADER_SIZE};
use maize_yield::testing::random_feature_vector;
use maize_yield::{ModelHandle, ModelLoadError, PersistError, YieldModel};

use common::trained_model;

#[test]
fn persisted_model_predicts_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a").join("b").join("model.forest");
    let model = trained_model(100, 6, 5);
    model.persist(&path).unwrap();

    let loaded = YieldModel::load(&path).unwrap();
    for seed in 0..10 {
        let x = random_feature_vector(seed);
        assert_eq!(loaded.predict(&x), model.predict(&x));
        assert_eq!(loaded.explain(&x), model.explain(&x));
    }
}

#[test]
fn every_corrupted_payload_byte_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.forest");
    let bytes = trained_model(40, 2, 3).to_bytes().unwrap();

    for idx in HEADER_SIZE..bytes.len() {
        let mut corrupted = bytes.clone();
        corrupted[idx] ^= 0x5A;
        std::fs::write(&path, &corrupted).unwrap();
        match YieldModel::load(&path) {
            Err(ModelLoadError::Format { source: DeserializeError::ChecksumMismatch { .. }, .. }) => {}
            other => panic!("byte {idx}: unexpected {other:?}"),
        }
    }
}

#[test]
fn truncated_artifact_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.forest");
    let bytes = trained_model(40, 2, 3).to_bytes().unwrap();

    for len in [0, 10, HEADER_SIZE, bytes.len() - 1] {
        std::fs::write(&path, &bytes[..len]).unwrap();
        assert!(
            matches!(
                YieldModel::load(&path),
                Err(ModelLoadError::Format { source: DeserializeError::Truncated { .. }, .. })
            ),
            "length {len}"
        );
    }
}

#[test]
fn wrong_magic_and_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.forest");
    let bytes = trained_model(40, 2, 3).to_bytes().unwrap();

    let mut foreign = bytes.clone();
    foreign[..4].copy_from_slice(b"BSTR");
    std::fs::write(&path, &foreign).unwrap();
    assert!(matches!(
        YieldModel::load(&path),
        Err(ModelLoadError::Format { source: DeserializeError::NotAModel, .. })
    ));

    let mut future = bytes;
    future[4] = 2;
    std::fs::write(&path, &future).unwrap();
    assert!(matches!(
        YieldModel::load(&path),
        Err(ModelLoadError::Format {
            source: DeserializeError::UnsupportedVersion { major: 2, .. },
            ..
        })
    ));
}

#[test]
fn tampered_header_fields_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.forest");
    let bytes = trained_model(40, 2, 3).to_bytes().unwrap();

    let mut flags = bytes.clone();
    flags[9] = 0xFF;
    std::fs::write(&path, &flags).unwrap();
    assert!(matches!(
        YieldModel::load(&path),
        Err(ModelLoadError::Format { source: DeserializeError::UnknownFlags(_), .. })
    ));

    let mut reserved = bytes.clone();
    reserved[30] = 7;
    std::fs::write(&path, &reserved).unwrap();
    assert!(matches!(
        YieldModel::load(&path),
        Err(ModelLoadError::Format { source: DeserializeError::ReservedBytes, .. })
    ));

    // a trained model passed off as the demo
    let mut demo = bytes;
    demo[8] |= 1;
    std::fs::write(&path, &demo).unwrap();
    assert!(matches!(
        YieldModel::load(&path),
        Err(ModelLoadError::Format { source: DeserializeError::CorruptPayload(_), .. })
    ));
}

#[test]
fn failed_persist_keeps_existing_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.forest");
    let original = trained_model(60, 3, 4);
    original.persist(&path).unwrap();
    let before = std::fs::read(&path).unwrap();

    // a regular file where the parent directory should be
    let blocked = path.join("nested.forest");
    let result = YieldModel::demo().persist(&blocked);
    assert!(matches!(result, Err(PersistError::Io { .. })));

    assert_eq!(std::fs::read(&path).unwrap(), before);
    assert_eq!(YieldModel::load(&path).unwrap(), original);
}

#[test]
fn retrain_replaces_artifact_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.forest");
    YieldModel::demo().persist(&path).unwrap();
    let mut handle = ModelHandle::load(&path).unwrap();
    assert!(!handle.is_authoritative());

    trained_model(60, 3, 4).persist(&path).unwrap();
    assert!(handle.reload().unwrap());
    assert!(handle.is_authoritative());

    // only the artifact remains, no temporary files
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}
