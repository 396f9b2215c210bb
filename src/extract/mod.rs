//! Turning fetched HTML into item links and flat records.
//!
//! # Example
//!
//! ```
//! use harvester_core::extract::ItemExtractor;
//!
//! let fields = vec![("title".to_string(), "h1".to_string())];
//! let extractor = ItemExtractor::new(&fields).unwrap();
//!
//! let record = extractor
//!     .extract("<h1> Brush </h1>", "https://shop.example/item/1")
//!     .unwrap();
//! assert_eq!(record.get("title"), Some("Brush"));
//! ```

mod error;
mod record;
mod selector;

pub use error::ExtractError;
pub use record::{Record, TIMESTAMP_COLUMN, TIMESTAMP_FORMAT, URL_COLUMN};
pub use selector::{FieldSelector, LinkSelector};

use scraper::Html;
use tracing::{debug, instrument};

/// Field that gets currency and whitespace stripped.
const PRICE_FIELD: &str = "price";

/// Tokens removed from price values.
const PRICE_NOISE: [&str; 4] = ["\u{a0}", " ", "руб.", "₽"];

/// Strips currency marks and spacing from a price (`"1 290 руб."` → `"1290"`).
#[must_use]
pub fn normalize_price(value: &str) -> String {
    PRICE_NOISE
        .iter()
        .fold(value.to_string(), |acc, noise| acc.replace(noise, ""))
        .trim()
        .to_string()
}

/// Applies an item page's field table to a document.
#[derive(Debug, Clone)]
pub struct ItemExtractor {
    fields: Vec<(String, FieldSelector)>,
}

impl ItemExtractor {
    /// Compiles an ordered `(field, expression)` table.
    ///
    /// # Errors
    ///
    /// Returns the first [`ExtractError`] hit while compiling an expression.
    pub fn new(fields: &[(String, String)]) -> Result<Self, ExtractError> {
        let fields = fields
            .iter()
            .map(|(name, expression)| Ok((name.clone(), FieldSelector::parse(name, expression)?)))
            .collect::<Result<Vec<_>, ExtractError>>()?;
        Ok(Self { fields })
    }

    /// Declared field names, in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Extracts one record from `html`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::EmptyDocument`] when `html` holds nothing.
    #[instrument(skip(self, html), fields(html_len = html.len()))]
    pub fn extract(&self, html: &str, url: &str) -> Result<Record, ExtractError> {
        if html.trim().is_empty() {
            return Err(ExtractError::empty_document(url));
        }

        let document = Html::parse_document(html);
        let values = self
            .fields
            .iter()
            .map(|(name, selector)| {
                let value = selector.select(&document).map(|value| {
                    if name == PRICE_FIELD {
                        normalize_price(&value)
                    } else {
                        value
                    }
                });
                (name.clone(), value)
            })
            .collect::<Vec<_>>();

        let matched = values.iter().filter(|(_, value)| value.is_some()).count();
        debug!(matched, total = values.len(), "extracted fields");
        Ok(Record::new(values, url))
    }
}
