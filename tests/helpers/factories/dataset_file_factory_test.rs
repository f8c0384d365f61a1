use super::dataset_file_factory::DatasetFileFactory;
use tempfile::tempdir;

#[test]
fn creates_requested_record_counts() {
    let doc = DatasetFileFactory::new()
        .with_records(4)
        .with_malformed(2)
        .create();

    let spectra = doc["spectra"].as_array().unwrap();
    assert_eq!(spectra.len(), 6);
    assert_eq!(spectra.iter().filter(|r| r.is_object()).count(), 4);
    assert_eq!(doc["dataset_info"]["total_spectra"], 4);
}

#[test]
fn written_file_uses_normalized_title() {
    let dir = tempdir().unwrap();
    let path = DatasetFileFactory::new()
        .with_title("Oak Leaves 2019")
        .write(dir.path());

    assert!(path.ends_with("spectra_Oak_Leaves_2019.json"));
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&text).is_ok());
}

#[test]
fn truncated_file_does_not_parse() {
    let dir = tempdir().unwrap();
    let path = DatasetFileFactory::new().write_truncated(dir.path());
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&text).is_err());
}
