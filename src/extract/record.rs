//! Extracted item records.

use chrono::Local;

/// Layout of [`Record::timestamp`].
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column name for the item URL.
pub const URL_COLUMN: &str = "url";

/// Column name for the extraction time.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// One extracted item.
///
/// Field order is the declaration order of the field table. Every declared
/// field is present; a field nothing matched holds `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, Option<String>)>,
    url: String,
    timestamp: String,
}

impl Record {
    /// Creates a record stamped with the current local time.
    #[must_use]
    pub fn new(fields: Vec<(String, Option<String>)>, url: impl Into<String>) -> Self {
        Self::with_timestamp(fields, url, Local::now().format(TIMESTAMP_FORMAT).to_string())
    }

    /// Creates a record with an explicit timestamp.
    #[must_use]
    pub fn with_timestamp(
        fields: Vec<(String, Option<String>)>,
        url: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            fields,
            url: url.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Declared fields in order.
    #[must_use]
    pub fn fields(&self) -> &[(String, Option<String>)] {
        &self.fields
    }

    /// Value of a declared field, or of `url` / `timestamp`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            URL_COLUMN => Some(&self.url),
            TIMESTAMP_COLUMN => Some(&self.timestamp),
            _ => self
                .fields
                .iter()
                .find(|(field, _)| field == name)
                .and_then(|(_, value)| value.as_deref()),
        }
    }

    /// Page the record came from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Extraction time, formatted with [`TIMESTAMP_FORMAT`].
    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Human label for logs: the `title` field when it has a value, else the URL.
    #[must_use]
    pub fn label(&self) -> &str {
        self.get("title")
            .filter(|title| !title.is_empty())
            .unwrap_or(self.url.as_str())
    }

    /// Column names: declared fields, then `url`, then `timestamp`.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(|(name, _)| name.as_str())
            .chain([URL_COLUMN, TIMESTAMP_COLUMN])
    }

    /// Values in column order, with missing fields as `""`.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(|(_, value)| value.as_deref().unwrap_or(""))
            .chain([self.url.as_str(), self.timestamp.as_str()])
    }
}
