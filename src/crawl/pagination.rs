//! Catalog page URLs from a `{page}` template.

/// Placeholder replaced with the page number.
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Path-style pagination segments, longest first.
const PATH_SEGMENTS: [&str; 2] = ["/page/{page}/", "/page/{page}"];

/// Catalog URL template such as `https://shop.example/catalog/page/{page}/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTemplate {
    template: String,
}

impl CatalogTemplate {
    /// Wraps a template string.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// The raw template.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Whether the template paginates at all.
    #[must_use]
    pub fn is_paginated(&self) -> bool {
        self.template.contains(PAGE_PLACEHOLDER)
    }

    /// URL of catalog page `page` (1-based).
    ///
    /// Page 1 is the canonical catalog URL with the pagination fragment
    /// removed. A template without a placeholder has only page 1, so later
    /// pages are `None`, as is page 0.
    #[must_use]
    pub fn url_for(&self, page: u32) -> Option<String> {
        match page {
            0 => None,
            1 => Some(self.first_page()),
            _ if self.is_paginated() => {
                Some(self.template.replace(PAGE_PLACEHOLDER, &page.to_string()))
            }
            _ => None,
        }
    }

    fn first_page(&self) -> String {
        if !self.is_paginated() {
            return self.template.clone();
        }

        if let Some(segment) = PATH_SEGMENTS.iter().find(|s| self.template.contains(*s)) {
            let mut url = self.template.replacen(segment, "/", 1);
            if url.ends_with("//") && !url.ends_with("://") {
                url.pop();
            }
            return url.replace(PAGE_PLACEHOLDER, "1");
        }

        strip_query_page(&self.template).replace(PAGE_PLACEHOLDER, "1")
    }
}

/// Removes a `page={page}` query parameter, keeping any other parameters.
fn strip_query_page(template: &str) -> String {
    let param = format!("page={PAGE_PLACEHOLDER}");
    let Some((base, query)) = template.split_once('?') else {
        return template.to_string();
    };

    let kept: Vec<&str> = query.split('&').filter(|pair| *pair != param).collect();
    if kept.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", kept.join("&"))
    }
}
