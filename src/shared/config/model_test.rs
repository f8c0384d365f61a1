use super::model::{MergeConfig, Settings, load_settings_from};
use indoc::indoc;

#[test]
fn defaults_match_documented_thresholds() {
    let settings = Settings::default();

    assert_eq!(settings.merge.min_file_bytes, 100);
    assert_eq!(settings.merge.large_file_bytes, 50 * 1024 * 1024);
    assert_eq!(settings.merge.flush_every_records, 200);
    assert_eq!(settings.merge.record_cap, 2000);
    assert_eq!(settings.merge.output_prefix, "merged_spectra");
    assert!((settings.merge.memory_budget_fraction - 0.20).abs() < f64::EPSILON);

    assert_eq!(settings.memory.moderate_growth_mb, 300);
    assert_eq!(settings.memory.high_growth_mb, 500);
    assert_eq!(settings.memory.high_process_rss_mb, 800);
    assert_eq!(settings.memory.critical_available_mb, 200);
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist");

    let settings = load_settings_from(path.to_str().unwrap()).unwrap();
    assert_eq!(settings.merge.chunk_size, MergeConfig::default().chunk_size);
}

#[test]
fn file_values_override_defaults_per_field() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("merge.toml");
    std::fs::write(
        &path,
        indoc! {r#"
            [merge]
            record_cap = 50
            max_files_per_batch = 3

            [memory]
            high_system_percent = 70.0
        "#},
    )
    .unwrap();

    let settings = load_settings_from(path.to_str().unwrap()).unwrap();
    assert_eq!(settings.merge.record_cap, 50);
    assert_eq!(settings.merge.max_files_per_batch, 3);
    // Untouched fields keep their defaults
    assert_eq!(settings.merge.chunk_size, 100);
    assert!((settings.memory.high_system_percent - 70.0).abs() < f64::EPSILON);
    assert_eq!(settings.memory.critical_available_mb, 200);
}

#[test]
fn chunk_size_shrinks_for_large_files() {
    let cfg = MergeConfig {
        large_file_bytes: 1_000,
        chunk_size: 100,
        large_file_chunk_size: 25,
        ..MergeConfig::default()
    };

    assert_eq!(cfg.chunk_size_for(999), 100);
    assert_eq!(cfg.chunk_size_for(1_000), 100);
    assert_eq!(cfg.chunk_size_for(1_001), 25);
}
