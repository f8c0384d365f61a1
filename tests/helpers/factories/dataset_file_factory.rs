use rand::Rng;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

/// Writes per-dataset files in the downloaded layout:
/// `{"dataset_info": {...}, "spectra": [...]}`.
pub struct DatasetFileFactory {
    title: String,
    records: usize,
    malformed: usize,
    wavelengths: usize,
}

impl DatasetFileFactory {
    pub fn new() -> Self {
        Self {
            title: "Test Dataset".to_string(),
            records: 10,
            malformed: 0,
            wavelengths: 8,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_records(mut self, records: usize) -> Self {
        self.records = records;
        self
    }

    /// Appends records that are not JSON objects
    pub fn with_malformed(mut self, malformed: usize) -> Self {
        self.malformed = malformed;
        self
    }

    pub fn with_wavelengths(mut self, wavelengths: usize) -> Self {
        self.wavelengths = wavelengths;
        self
    }

    pub fn file_name(&self) -> String {
        let clean: String = self
            .title
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("spectra_{}.json", clean)
    }

    pub fn create(&self) -> Value {
        let mut rng = rand::thread_rng();
        let mut spectra: Vec<Value> = (0..self.records)
            .map(|i| {
                let mut record = serde_json::Map::new();
                record.insert("sample_id".into(), json!(format!("S-{:04}", i)));
                for w in 0..self.wavelengths {
                    let reflectance: f64 = rng.gen_range(0.0..1.0);
                    record.insert((350 + w).to_string(), json!(reflectance));
                }
                Value::Object(record)
            })
            .collect();
        spectra.extend((0..self.malformed).map(|i| json!(i)));

        json!({
            "dataset_info": {
                "id": format!("{}-id", self.title),
                "title": self.title,
                "download_date": "2026-01-01T00:00:00",
                "total_spectra": self.records,
                "source": "EcoSIS API"
            },
            "spectra": spectra
        })
    }

    pub fn write(&self, dir: &Path) -> PathBuf {
        let path = dir.join(self.file_name());
        let text = serde_json::to_string_pretty(&self.create()).unwrap();
        std::fs::write(&path, text).unwrap();
        path
    }

    /// Valid document cut in half
    pub fn write_truncated(&self, dir: &Path) -> PathBuf {
        let path = dir.join(self.file_name());
        let text = serde_json::to_string_pretty(&self.create()).unwrap();
        std::fs::write(&path, &text.as_bytes()[..text.len() / 2]).unwrap();
        path
    }

    pub fn write_empty(dir: &Path, name: &str) -> PathBuf {
        Self::write_raw(dir, name, "")
    }

    pub fn write_raw(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}
