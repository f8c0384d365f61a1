use serde::Deserialize;
use serde_json::value::RawValue;

/// Borrowed view of one downloaded dataset file:
///
/// ```text
/// {"dataset_info": {...}, "spectra": [{...}, ...]}
/// ```
///
/// Every value is a slice of the read buffer; nothing is re-encoded.
/// Other top-level fields are ignored.
#[derive(Debug, Deserialize)]
pub struct DatasetDocument<'a> {
    #[serde(borrow)]
    pub dataset_info: &'a RawValue,
    #[serde(borrow)]
    pub spectra: Vec<&'a RawValue>,
}

impl<'a> DatasetDocument<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn has_object_info(&self) -> bool {
        is_object(self.dataset_info)
    }
}

/// A record has to be a JSON object; anything else is malformed.
pub fn is_object(raw: &RawValue) -> bool {
    raw.get().trim_start().starts_with('{')
}
