//! Site profile: URLs, payload marker and field names for the search site.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::Target;

/// Listings per search result page, used to convert a result count to pages.
pub const RESULTS_PER_PAGE: u64 = 40;

/// Everything site-specific the crawl pipeline needs to know.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SiteProfile {
    /// Site origin; also used to absolutize relative detail links.
    pub base_url: String,
    /// Path visited once to warm the session up.
    pub entry_path: String,
    /// First results page, `{target}` is substituted.
    pub search_path: String,
    /// Subsequent results pages, `{target}` and `{page}` are substituted.
    pub paged_search_path: String,
    /// CSS selector for the script element carrying the payload.
    pub payload_selector: String,
    /// Primary results array key.
    pub primary_results_key: String,
    /// Secondary results array key, merged by identifier.
    pub secondary_results_key: String,
    pub total_pages_key: String,
    pub total_count_key: String,
    /// Identifier field, the dedup key.
    pub id_field: String,
    /// Case-insensitive title fragments that mean the session is blocked.
    pub block_title_markers: Vec<String>,
    /// Case-insensitive content fragments that mean the session is blocked.
    pub block_content_markers: Vec<String>,
    /// Top-level fields copied into the normalized record.
    pub listing_fields: Vec<String>,
    /// Fields coerced to numbers (dropped when malformed).
    pub numeric_fields: Vec<String>,
    /// Keys that may carry an address object or raw address string.
    pub address_keys: Vec<String>,
    /// Sub-fields pulled out of an address object.
    pub address_parts: Vec<String>,
    /// Path to the secondary "home info" block.
    pub home_info_path: Vec<String>,
    pub detail_url_field: String,
    pub price_field: String,
    pub price_raw_field: String,
    pub address_raw_field: String,
    /// Keys passed through untouched (multi-unit arrays, variable pricing).
    pub passthrough_fields: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            base_url: "https://www.zillow.com".to_string(),
            entry_path: "/".to_string(),
            search_path: "/homes/{target}_rb/".to_string(),
            paged_search_path: "/homes/{target}_rb/{page}_p/".to_string(),
            payload_selector: "script#__NEXT_DATA__".to_string(),
            primary_results_key: "listResults".to_string(),
            secondary_results_key: "mapResults".to_string(),
            total_pages_key: "totalPages".to_string(),
            total_count_key: "totalResultCount".to_string(),
            id_field: "zpid".to_string(),
            block_title_markers: strings(&["denied", "captcha"]),
            block_content_markers: Vec::new(),
            listing_fields: strings(&[
                "zpid",
                "streetAddress",
                "city",
                "state",
                "zipcode",
                "price",
                "zestimate",
                "rentZestimate",
                "taxAssessedValue",
                "bedrooms",
                "bathrooms",
                "livingArea",
                "lotAreaValue",
                "lotAreaUnits",
                "homeType",
                "homeStatus",
                "yearBuilt",
                "daysOnZillow",
                "timeOnZillow",
                "latitude",
                "longitude",
                "imgSrc",
                "detailUrl",
                "statusText",
                "brokerName",
                "mlsid",
                "propertyTaxRate",
                "monthlyHoaFee",
                "priceChange",
                "datePriceChanged",
                "isZillowOwned",
                "isFeatured",
                "isPreforeclosureAuction",
                "newConstructionType",
                "listingSubType",
                "country",
                "currency",
            ]),
            numeric_fields: strings(&[
                "zestimate",
                "rentZestimate",
                "taxAssessedValue",
                "bedrooms",
                "bathrooms",
                "livingArea",
                "lotAreaValue",
                "yearBuilt",
                "daysOnZillow",
                "latitude",
                "longitude",
                "propertyTaxRate",
                "monthlyHoaFee",
                "priceChange",
            ]),
            address_keys: strings(&["address", "addressWithZip"]),
            address_parts: strings(&["streetAddress", "city", "state", "zipcode"]),
            home_info_path: strings(&["hdpData", "homeInfo"]),
            detail_url_field: "detailUrl".to_string(),
            price_field: "price".to_string(),
            price_raw_field: "priceRaw".to_string(),
            address_raw_field: "addressRaw".to_string(),
            passthrough_fields: strings(&["units", "variableData"]),
        }
    }
}

impl SiteProfile {
    /// URL of the neutral page visited before the first target.
    pub fn entry_url(&self) -> String {
        self.join(&self.entry_path)
    }

    /// Results page URL for a target. Page 1 uses the bare search form.
    pub fn search_url(&self, target: &Target, page: u32) -> String {
        let path = if page <= 1 {
            self.search_path.replace("{target}", target.as_str())
        } else {
            self.paged_search_path
                .replace("{target}", target.as_str())
                .replace("{page}", &page.to_string())
        };
        self.join(&path)
    }

    /// Resolve a possibly relative link against the site origin.
    pub fn absolutize(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            return link.to_string();
        }
        match Url::parse(&self.base_url).and_then(|base| base.join(link)) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}{}", self.base_url.trim_end_matches('/'), link),
        }
    }

    fn join(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
