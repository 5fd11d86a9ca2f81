//! Flatten raw site listings into the canonical record shape.

use serde_json::{Map, Number, Value};

use super::site::SiteProfile;
use crate::models::{DedupKey, NormalizedListing, RawListing};

/// Pure, idempotent raw → canonical listing transform.
#[derive(Debug, Clone)]
pub struct ListingNormalizer {
    site: SiteProfile,
}

impl ListingNormalizer {
    pub fn new(site: SiteProfile) -> Self {
        Self { site }
    }

    /// Normalize one raw record. Returns `None` when the record carries no
    /// usable identifier; callers drop those.
    pub fn normalize(&self, raw: &RawListing) -> Option<NormalizedListing> {
        let site = &self.site;
        let mut out = Map::new();

        for field in &site.listing_fields {
            if let Some(v) = raw.get(field).filter(|v| !v.is_null()) {
                out.insert(field.clone(), v.clone());
            }
        }

        self.merge_address(raw, &mut out);
        self.merge_home_info(raw, &mut out);

        let relative_link = match out.get(&site.detail_url_field) {
            Some(Value::String(link)) if !link.is_empty() && !link.starts_with("http") => {
                Some(site.absolutize(link))
            }
            _ => None,
        };
        if let Some(absolute) = relative_link {
            out.insert(site.detail_url_field.clone(), Value::String(absolute));
        }

        if let Some(Value::String(price)) = out.get(&site.price_field).cloned() {
            out.insert(site.price_raw_field.clone(), Value::String(price.clone()));
            if let Some(parsed) = parse_price(&price) {
                out.insert(site.price_field.clone(), Value::from(parsed));
            }
        }

        for field in &site.numeric_fields {
            let Some(value) = out.get(field) else { continue };
            match coerce_number(value) {
                Some(n) => {
                    out.insert(field.clone(), n);
                }
                None => {
                    out.remove(field);
                }
            }
        }

        for field in &site.passthrough_fields {
            if let Some(v) = raw.get(field) {
                out.insert(field.clone(), v.clone());
            }
        }

        let key = out.get(&site.id_field).and_then(DedupKey::from_value)?;
        Some(NormalizedListing::new(key, out))
    }

    fn merge_address(&self, raw: &RawListing, out: &mut Map<String, Value>) {
        let address = self
            .site
            .address_keys
            .iter()
            .filter_map(|k| raw.get(k))
            .find(|v| is_truthy(v));

        match address {
            Some(Value::Object(parts)) => {
                for part in &self.site.address_parts {
                    if out.contains_key(part) {
                        continue;
                    }
                    if let Some(v) = parts.get(part).filter(|v| is_truthy(v)) {
                        out.insert(part.clone(), v.clone());
                    }
                }
            }
            Some(Value::String(s)) => {
                let has_street = self
                    .site
                    .address_parts
                    .first()
                    .is_some_and(|street| out.contains_key(street));
                if !has_street {
                    out.insert(
                        self.site.address_raw_field.clone(),
                        Value::String(s.clone()),
                    );
                }
            }
            _ => {}
        }
    }

    fn merge_home_info(&self, raw: &RawListing, out: &mut Map<String, Value>) {
        let mut path = self.site.home_info_path.iter();
        let Some(first) = path.next() else { return };
        let mut node = raw.get(first);
        for segment in path {
            node = node.and_then(|n| n.get(segment));
        }
        let Some(Value::Object(info)) = node else { return };

        for field in &self.site.listing_fields {
            if out.contains_key(field) {
                continue;
            }
            if let Some(v) = info.get(field).filter(|v| !v.is_null()) {
                out.insert(field.clone(), v.clone());
            }
        }
    }
}

/// Strip everything but digits and dots, then truncate to an integer.
/// "$350,000" → 350000, "$1.2M" → 1. `None` when nothing parseable remains.
pub fn parse_price(s: &str) -> Option<i64> {
    let cleaned: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|f| f as i64)
}

fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, ',' | '$' | '%' | ' '))
                .collect();
            if let Ok(i) = cleaned.parse::<i64>() {
                return Some(Value::from(i));
            }
            cleaned
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
        }
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}
