//! A small fake shop served by wiremock.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn catalog_html(links: &[&str]) -> String {
    let items: String = links
        .iter()
        .map(|href| {
            format!(r#"<li><a class="woocommerce-LoopProduct-link" href="{href}">item</a></li>"#)
        })
        .collect();
    format!("<html><body><ul class=\"products\">{items}</ul></body></html>")
}

pub fn item_html(title: &str, price: &str) -> String {
    format!(
        "<html><body><h1 class=\"product_title\">{title}</h1>\
         <p class=\"price\"><bdi>{price}</bdi></p></body></html>"
    )
}

pub async fn mount_page(server: &MockServer, route: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html; charset=utf-8")
                .set_body_string(html),
        )
        .mount(server)
        .await;
}

pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Site config pointed at `uri`, with fast pacing and backoff.
pub fn site_config_json(uri: &str) -> String {
    format!(
        r#"{{
    "domain": "shop.test",
    "base_url": "{uri}",
    "fetch": {{ "rate_limit": "0s", "timeout_secs": 5, "max_pages": 50 }},
    "technologies": {{ "proxy": false, "browser": false }},
    "retry": {{ "max_attempts": 2, "backoff_secs": 0 }},
    "selectors": {{
        "list_page": {{
            "url": "{uri}/catalog/page/{{page}}/",
            "item_link": "a.woocommerce-LoopProduct-link"
        }},
        "item_page": {{
            "fields": {{ "title": "h1.product_title", "price": ".price bdi", "sku": ".sku" }}
        }}
    }}
}}"#
    )
}
