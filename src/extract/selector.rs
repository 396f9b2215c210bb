//! Selector expressions from the site configuration.
//!
//! An expression is a CSS selector, optionally suffixed with `::attr(name)` to
//! read an attribute instead of text. Field expressions may list several
//! comma-separated alternatives which are tried in order.

use scraper::{ElementRef, Html, Selector};
use tracing::trace;
use url::Url;

use super::error::ExtractError;

const ATTR_MARKER: &str = "::attr";

/// Splits `"a.link::attr(href)"` into `("a.link", Some("href"))`.
fn split_attr(expression: &str) -> (&str, Option<&str>) {
    match expression.split_once(ATTR_MARKER) {
        Some((css, attr)) => {
            let attr = attr
                .trim()
                .trim_start_matches('(')
                .trim_end_matches(')')
                .trim();
            (css.trim(), Some(attr).filter(|a| !a.is_empty()))
        }
        None => (expression.trim(), None),
    }
}

fn compile(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::invalid_selector(css, e))
}

#[derive(Debug, Clone)]
struct Alternative {
    selector: Selector,
    attr: Option<String>,
}

impl Alternative {
    /// Value of the first matching element: its attribute when one is named,
    /// otherwise its trimmed text. Empty text counts as no match.
    fn first_value(&self, document: &Html) -> Option<String> {
        let element = document.select(&self.selector).next()?;
        match &self.attr {
            Some(attr) => element.value().attr(attr).map(|v| v.trim().to_string()),
            None => {
                let text = element_text(element);
                (!text.is_empty()).then_some(text)
            }
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// A field selector: ordered alternatives, first hit wins.
#[derive(Debug, Clone)]
pub struct FieldSelector {
    expression: String,
    alternatives: Vec<Alternative>,
}

impl FieldSelector {
    /// Compiles a field expression such as `"h1.title, h1"` or
    /// `"meta[itemprop=price]::attr(content)"`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::EmptySelector`] when no alternative is given and
    /// [`ExtractError::InvalidSelector`] when any alternative is not valid CSS.
    pub fn parse(field: &str, expression: &str) -> Result<Self, ExtractError> {
        let alternatives = expression
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (css, attr) = split_attr(part);
                Ok(Alternative {
                    selector: compile(css)?,
                    attr: attr.map(ToString::to_string),
                })
            })
            .collect::<Result<Vec<_>, ExtractError>>()?;

        if alternatives.is_empty() {
            return Err(ExtractError::empty_selector(field));
        }

        Ok(Self {
            expression: expression.to_string(),
            alternatives,
        })
    }

    /// The expression this selector was compiled from.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First value produced by any alternative, in declaration order.
    #[must_use]
    pub fn select(&self, document: &Html) -> Option<String> {
        self.alternatives
            .iter()
            .find_map(|alternative| alternative.first_value(document))
    }
}

/// Pulls item links out of a catalog page.
#[derive(Debug, Clone)]
pub struct LinkSelector {
    selector: Selector,
    attr: String,
    base: Url,
}

impl LinkSelector {
    /// Compiles a link expression. The attribute defaults to `href`; relative
    /// links are resolved against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExtractError`] for an empty or invalid selector, or a base
    /// URL that cannot be parsed.
    pub fn new(expression: &str, base_url: &str) -> Result<Self, ExtractError> {
        let (css, attr) = split_attr(expression);
        if css.is_empty() {
            return Err(ExtractError::empty_selector("item_link"));
        }

        let base_text = format!("{}/", base_url.trim_end_matches('/'));
        let base =
            Url::parse(&base_text).map_err(|e| ExtractError::invalid_base_url(base_url, e))?;

        Ok(Self {
            selector: compile(css)?,
            attr: attr.unwrap_or("href").to_string(),
            base,
        })
    }

    /// Absolute URLs of every matching element, in document order.
    ///
    /// Elements without the attribute, or whose value cannot be resolved, are
    /// left out.
    #[must_use]
    pub fn extract(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.selector)
            .filter_map(|element| element.value().attr(&self.attr))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .filter_map(|href| self.resolve(href))
            .collect()
    }

    fn resolve(&self, href: &str) -> Option<String> {
        if href.starts_with("http") {
            return Some(href.to_string());
        }
        match self.base.join(href) {
            Ok(url) => Some(url.to_string()),
            Err(error) => {
                trace!(href, error = %error, "skipping unresolvable link");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ITEM: &str = r#"
        <html><body>
            <h1 class="title">  Brush No. 5 </h1>
            <span class="empty">   </span>
            <p class="sku">A-100</p>
            <meta itemprop="price" content=" 1 290 ">
            <img class="photo" src="/img/5.jpg">
        </body></html>
    "#;

    // ==================== split_attr Tests ====================

    #[test]
    fn test_split_attr_plain_css() {
        assert_eq!(split_attr(" h1.title "), ("h1.title", None));
    }

    #[test]
    fn test_split_attr_with_attribute() {
        assert_eq!(split_attr("img.photo::attr(src)"), ("img.photo", Some("src")));
    }

    #[test]
    fn test_split_attr_empty_attribute_name() {
        assert_eq!(split_attr("a::attr()"), ("a", None));
    }

    // ==================== FieldSelector Tests ====================

    #[test]
    fn test_field_selector_text() {
        let selector = FieldSelector::parse("title", "h1.title").unwrap();
        let doc = Html::parse_document(ITEM);
        assert_eq!(selector.select(&doc).as_deref(), Some("Brush No. 5"));
    }

    #[test]
    fn test_field_selector_attribute() {
        let selector = FieldSelector::parse("price", "meta[itemprop=price]::attr(content)").unwrap();
        let doc = Html::parse_document(ITEM);
        assert_eq!(selector.select(&doc).as_deref(), Some("1 290"));
    }

    #[test]
    fn test_field_selector_falls_through_alternatives() {
        let selector = FieldSelector::parse("sku", ".missing, span.empty, p.sku").unwrap();
        let doc = Html::parse_document(ITEM);
        assert_eq!(selector.select(&doc).as_deref(), Some("A-100"));
    }

    #[test]
    fn test_field_selector_missing_attribute_is_no_match() {
        let selector = FieldSelector::parse("image", "img.photo::attr(data-src)").unwrap();
        let doc = Html::parse_document(ITEM);
        assert_eq!(selector.select(&doc), None);
    }

    #[test]
    fn test_field_selector_rejects_invalid_css() {
        let err = FieldSelector::parse("title", "h1[").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidSelector { .. }));
    }

    #[test]
    fn test_field_selector_rejects_empty_expression() {
        let err = FieldSelector::parse("title", " , ").unwrap_err();
        assert!(matches!(err, ExtractError::EmptySelector { .. }));
    }

    // ==================== LinkSelector Tests ====================

    const CATALOG: &str = r#"
        <ul>
            <li><a class="product" href="/item/1">One</a></li>
            <li><a class="product" href="item/2">Two</a></li>
            <li><a class="product" href="https://cdn.shop.example/item/3">Three</a></li>
            <li><a class="product">No href</a></li>
            <li><a class="product" data-url="/item/4" href="">Blank</a></li>
        </ul>
    "#;

    #[test]
    fn test_link_selector_resolves_relative_links() {
        let links = LinkSelector::new("a.product", "https://shop.example")
            .unwrap()
            .extract(CATALOG);
        assert_eq!(
            links,
            vec![
                "https://shop.example/item/1",
                "https://shop.example/item/2",
                "https://cdn.shop.example/item/3",
            ]
        );
    }

    #[test]
    fn test_link_selector_custom_attribute() {
        let links = LinkSelector::new("a.product::attr(data-url)", "https://shop.example/")
            .unwrap()
            .extract(CATALOG);
        assert_eq!(links, vec!["https://shop.example/item/4"]);
    }

    #[test]
    fn test_link_selector_no_matches() {
        let links = LinkSelector::new("a.missing", "https://shop.example")
            .unwrap()
            .extract(CATALOG);
        assert!(links.is_empty());
    }

    #[test]
    fn test_link_selector_rejects_bad_base() {
        let err = LinkSelector::new("a", "not a url").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidBaseUrl { .. }));
    }
}
