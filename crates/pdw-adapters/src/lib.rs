//! O2 catalog adapter: listing scrape, link and spec normalization,
//! per-product variant extraction.

use pdw_core::{Product, ProductVariant, Stock, Variant};
use pdw_storage::{FetchError, HttpFetcher};
use scraper::{Html, Selector};
use serde_json::Value as JsonValue;
use thiserror::Error;

pub const CRATE_NAME: &str = "pdw-adapters";

const LISTING_PATH: &str = "/shop/phones";
const SPEC_SENTINEL: &str = "connectivity:N/A";
const LIKE_NEW_SUFFIX: &str = "-like-new";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid selector `{0}`")]
    Selector(String),
    #[error("malformed catalog link `{0}`")]
    MalformedLink(String),
    #[error("spec token `{0}` has no `:` separator")]
    MalformedSpecToken(String),
    #[error("undecodable variant key `{0}`")]
    UndecodableVariantKey(String),
    #[error("missing `{0}` in catalog payload")]
    MissingField(&'static str),
    #[error("unknown stock value `{0}`")]
    UnknownStock(String),
    #[error("invalid product details JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn selector(css: &str) -> Result<Selector, AdapterError> {
    Selector::parse(css).map_err(|e| AdapterError::Selector(e.to_string()))
}

/// Model identity from a listing link such as
/// `/shop/samsung/galaxy-s20-ultra-5g#contractType=paymonthly`: the
/// path segment before the fragment, with the like-new suffix stripped
/// so both conditions of a phone share one model key.
pub fn parse_model_slug(link: &str) -> Result<String, AdapterError> {
    let segment = link
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AdapterError::MalformedLink(link.to_string()))?;
    let (slug, _fragment) = segment
        .split_once('#')
        .ok_or_else(|| AdapterError::MalformedLink(link.to_string()))?;
    let slug = slug.strip_suffix(LIKE_NEW_SUFFIX).unwrap_or(slug);
    Ok(slug.to_string())
}

/// Listing links point at the marketing page; the variant data lives on
/// the tariff page.
pub fn tariff_link(link: &str) -> String {
    link.replacen("/shop", "/shop/tariff", 1)
}

/// Split an unescaped spec string (`connectivity:N/A_colour:black_memory:64gb`)
/// into the colour and the normalized spec. The sentinel token is
/// dropped, the colour token is extracted, every other token is kept
/// verbatim in order. A token without a separator is a hard error.
pub fn parse_spec(raw: &str) -> Result<(String, String), AdapterError> {
    let mut color = String::new();
    let mut tokens = Vec::new();
    for token in raw.split('_') {
        if token == SPEC_SENTINEL {
            continue;
        }
        let (key, value) = token
            .split_once(':')
            .ok_or_else(|| AdapterError::MalformedSpecToken(token.to_string()))?;
        if key == "colour" {
            color = value.to_string();
            continue;
        }
        tokens.push(token);
    }
    Ok((color, tokens.join(" ")))
}

/// Product tiles from the listing page.
pub fn parse_products(html: &str) -> Result<Vec<Product>, AdapterError> {
    let document = Html::parse_document(html);
    let tiles = selector("a.device-tile")?;

    let mut products = Vec::new();
    for tile in document.select(&tiles) {
        let link = tile
            .value()
            .attr("href")
            .ok_or(AdapterError::MissingField("href"))?;
        let brand = tile
            .value()
            .attr("data-qa-device-brand")
            .ok_or(AdapterError::MissingField("data-qa-device-brand"))?;
        let condition = tile
            .value()
            .attr("data-qa-device-condition")
            .ok_or(AdapterError::MissingField("data-qa-device-condition"))?;
        products.push(Product {
            brand: brand.to_string(),
            model: parse_model_slug(link)?,
            condition: condition.to_string(),
            link: tariff_link(link),
        });
    }
    Ok(products)
}

/// The settings blob embedded in a product detail page.
pub fn extract_details_json(html: &str) -> Result<String, AdapterError> {
    let document = Html::parse_document(html);
    let script = selector(r#"script[data-drupal-selector="drupal-settings-json"]"#)?;
    let node = document
        .select(&script)
        .next()
        .ok_or(AdapterError::MissingField("drupal-settings-json"))?;
    Ok(node.text().collect())
}

/// Variants from the settings blob. `ProductDetails` is itself a JSON
/// string inside the outer settings JSON; its `deviceInfoV2.variants`
/// map goes from a URL-escaped spec string to stock and pricing.
pub fn parse_product_details(details: &str) -> Result<Vec<Variant>, AdapterError> {
    let settings: JsonValue = serde_json::from_str(details)?;
    let product_details = settings
        .pointer("/o2_theme/ProductDetails")
        .and_then(JsonValue::as_str)
        .ok_or(AdapterError::MissingField("o2_theme.ProductDetails"))?;
    let device_info: JsonValue = serde_json::from_str(product_details)?;
    let variants = device_info
        .pointer("/deviceInfoV2/variants")
        .and_then(JsonValue::as_object)
        .ok_or(AdapterError::MissingField("deviceInfoV2.variants"))?;

    let mut parsed = Vec::new();
    for (escaped_spec, value) in variants {
        let raw_spec = urlencoding::decode(escaped_spec)
            .map_err(|_| AdapterError::UndecodableVariantKey(escaped_spec.clone()))?;
        let (color, spec) = parse_spec(&raw_spec)?;
        let stock_raw = value
            .pointer("/stockInfo/stock")
            .and_then(JsonValue::as_str)
            .ok_or(AdapterError::MissingField("stockInfo.stock"))?;
        let stock = Stock::from_catalog(stock_raw)
            .ok_or_else(|| AdapterError::UnknownStock(stock_raw.to_string()))?;
        let cash_price = value
            .pointer("/cashPrice/oneOff")
            .and_then(JsonValue::as_i64)
            .ok_or(AdapterError::MissingField("cashPrice.oneOff"))?;
        let rrp = value
            .pointer("/rrp/oneOff")
            .and_then(JsonValue::as_i64)
            .ok_or(AdapterError::MissingField("rrp.oneOff"))?;
        parsed.push(Variant {
            spec,
            color,
            stock,
            cash_price,
            rrp,
        });
    }
    Ok(parsed)
}

/// The retailer catalog as a fetchable source of products and variants.
#[derive(Debug, Clone)]
pub struct O2Catalog {
    base_url: String,
}

impl O2Catalog {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn listing_url(&self) -> String {
        format!("{}{}", self.base_url, LISTING_PATH)
    }

    pub async fn fetch_products(&self, http: &HttpFetcher) -> Result<Vec<Product>, AdapterError> {
        let html = http.fetch_text(&self.listing_url()).await?;
        parse_products(&html)
    }

    pub async fn fetch_variants(
        &self,
        http: &HttpFetcher,
        product: &Product,
    ) -> Result<Vec<ProductVariant>, AdapterError> {
        let url = format!("{}{}", self.base_url, product.link);
        let html = http.fetch_text(&url).await?;
        let details = extract_details_json(&html)?;
        let variants = parse_product_details(&details)?;
        Ok(variants
            .into_iter()
            .map(|variant| ProductVariant::from_parts(product, variant))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spec_parser_extracts_colour_and_drops_the_sentinel() {
        let (color, spec) =
            parse_spec("connectivity:N/A_colour:black_memory:64gb").expect("parse");
        assert_eq!(color, "black");
        assert_eq!(spec, "memory:64gb");
    }

    #[test]
    fn spec_parser_keeps_remaining_tokens_in_order() {
        let (color, spec) =
            parse_spec("memory:256gb_colour:starlight_sim:esim").expect("parse");
        assert_eq!(color, "starlight");
        assert_eq!(spec, "memory:256gb sim:esim");
    }

    #[test]
    fn spec_parser_rejects_a_token_without_separator() {
        let err = parse_spec("memory:64gb_black").expect_err("must fail");
        assert!(matches!(err, AdapterError::MalformedSpecToken(token) if token == "black"));
    }

    #[test]
    fn new_and_like_new_listings_share_a_model_slug() {
        let new = parse_model_slug("/shop/apple/iphone-12#contractType=paymonthly").expect("new");
        let like_new =
            parse_model_slug("/shop/apple/iphone-12-like-new#contractType=paymonthly")
                .expect("like-new");
        assert_eq!(new, like_new);
        assert_eq!(new, "iphone-12");
    }

    #[test]
    fn link_without_fragment_is_malformed() {
        let err = parse_model_slug("/shop/apple/iphone-12").expect_err("must fail");
        assert!(matches!(err, AdapterError::MalformedLink(_)));
    }

    #[test]
    fn tariff_link_rewrites_only_the_shop_prefix() {
        assert_eq!(
            tariff_link("/shop/samsung/galaxy-s20#contractType=paymonthly"),
            "/shop/tariff/samsung/galaxy-s20#contractType=paymonthly"
        );
    }

    #[test]
    fn listing_parse_reads_device_tiles() {
        let html = r##"
            <html><body>
              <a class="device-tile featured" href="/shop/apple/iphone-15#contractType=paymonthly"
                 data-qa-device-brand="Apple" data-qa-device-condition="new">iPhone 15</a>
              <a class="device-tile" href="/shop/apple/iphone-12-like-new#contractType=paymonthly"
                 data-qa-device-brand="Apple" data-qa-device-condition="like-new">iPhone 12</a>
              <a class="nav-link" href="/shop/accessories">Accessories</a>
            </body></html>
        "##;
        let products = parse_products(html).expect("parse");
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].model, "iphone-15");
        assert_eq!(products[0].link, "/shop/tariff/apple/iphone-15#contractType=paymonthly");
        assert_eq!(products[1].model, "iphone-12");
        assert_eq!(products[1].condition, "like-new");
    }

    fn details_payload(stock: &str) -> String {
        let product_details = json!({
            "deviceInfoV2": {
                "variants": {
                    "connectivity%3AN%2FA_colour%3Ablack_memory%3A64gb": {
                        "stockInfo": { "stock": stock },
                        "cashPrice": { "oneOff": 29_900 },
                        "rrp": { "oneOff": 41_900 }
                    }
                }
            }
        })
        .to_string();
        json!({ "o2_theme": { "ProductDetails": product_details } }).to_string()
    }

    #[test]
    fn product_details_parse_unwraps_the_doubly_encoded_payload() {
        let variants = parse_product_details(&details_payload("InStock")).expect("parse");
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].spec, "memory:64gb");
        assert_eq!(variants[0].color, "black");
        assert_eq!(variants[0].stock, Stock::InStock);
        assert_eq!(variants[0].cash_price, 29_900);
        assert_eq!(variants[0].rrp, 41_900);
    }

    #[test]
    fn unknown_stock_value_is_an_error() {
        let err = parse_product_details(&details_payload("Discontinued")).expect_err("must fail");
        assert!(matches!(err, AdapterError::UnknownStock(value) if value == "Discontinued"));
    }

    #[test]
    fn details_script_is_extracted_from_the_page() {
        let html = r#"
            <html><head>
              <script data-drupal-selector="drupal-settings-json">{"o2_theme":{}}</script>
            </head></html>
        "#;
        assert_eq!(extract_details_json(html).expect("extract"), r#"{"o2_theme":{}}"#);
    }

    #[test]
    fn listing_url_targets_the_phones_page() {
        let catalog = O2Catalog::new("https://www.o2.co.uk");
        assert_eq!(catalog.listing_url(), "https://www.o2.co.uk/shop/phones");
    }
}
