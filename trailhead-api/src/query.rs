//! Query builder: turns the flat query-string map into filter, sort, field
//! selection, and pagination pieces for a collection read.
//!
//! Reserved keys (`page`, `sort`, `limit`, `fields`) control the read; every
//! other key becomes filter criteria. Comparison suffixes in bracket form
//! (`price[gte]=100`) are rewritten into the driver's operator syntax.

use std::collections::HashMap;

use bson::{Bson, Document};
use serde_json::Value;

/// Keys that shape the query rather than filter it.
const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

const COMPARISON_OPS: [&str; 4] = ["gte", "gt", "lte", "lt"];

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: i64 = 100;

/// Raw list-query parameters, straight from the query string.
#[derive(Debug, Clone, Default)]
pub struct ListParams(pub HashMap<String, String>);

impl ListParams {
    pub fn new(params: HashMap<String, String>) -> Self {
        Self(params)
    }

    /// Preset a parameter; used by alias routes that pin limit/sort/fields.
    pub fn set(&mut self, key: &str, value: &str) -> &mut Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    /// Filter criteria with comparison suffixes rewritten.
    ///
    /// `price[gte]=100` becomes `{ "price": { "$gte": 100 } }`; plain keys
    /// pass through as equality matches. Multiple operators on one field
    /// merge into a single comparison document.
    pub fn filter_document(&self) -> Document {
        let mut filter = Document::new();

        for (key, value) in &self.0 {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }

            match split_comparison(key) {
                Some((field, op)) => {
                    let operator = format!("${op}");
                    match filter.get_document_mut(field) {
                        Ok(existing) => {
                            existing.insert(operator, parse_value(value));
                        }
                        Err(_) => {
                            let mut comparison = Document::new();
                            comparison.insert(operator, parse_value(value));
                            filter.insert(field, comparison);
                        }
                    }
                }
                None => {
                    filter.insert(key.clone(), parse_value(value));
                }
            }
        }

        filter
    }

    /// Sort specification: comma-separated fields, `-` prefix descending.
    /// Defaults to newest-first by creation time; listing order breaks ties.
    pub fn sort_document(&self) -> Document {
        let spec = self
            .0
            .get("sort")
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("-created_at");

        let mut sort = Document::new();
        for field in spec.split(',') {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            match field.strip_prefix('-') {
                Some(name) => sort.insert(name, -1),
                None => sort.insert(field, 1),
            };
        }
        sort
    }

    /// Comma-separated allow-list of fields to return, if requested.
    pub fn fields(&self) -> Option<Vec<String>> {
        self.0.get("fields").map(|spec| {
            spec.split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect()
        })
    }

    /// `(skip, limit)` from 1-based `page` (default 1) and `limit`
    /// (default 100). Non-numeric values fall back to the defaults.
    pub fn pagination(&self) -> (u64, i64) {
        let page = self
            .0
            .get("page")
            .and_then(|p| p.parse::<u64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(DEFAULT_PAGE);
        let limit = self
            .0
            .get("limit")
            .and_then(|l| l.parse::<i64>().ok())
            .filter(|l| *l >= 1)
            .unwrap_or(DEFAULT_LIMIT);

        ((page - 1) * limit as u64, limit)
    }
}

/// `price[gte]` → `("price", "gte")` when the suffix is a known comparison.
fn split_comparison(key: &str) -> Option<(&str, &str)> {
    let open = key.find('[')?;
    let field = &key[..open];
    let op = key.get(open + 1..key.len().checked_sub(1)?)?;
    if key.ends_with(']') && !field.is_empty() && COMPARISON_OPS.contains(&op) {
        Some((field, op))
    } else {
        None
    }
}

/// Values arrive as strings; recover the obvious scalar types so numeric
/// comparisons compare numerically.
fn parse_value(raw: &str) -> Bson {
    if let Ok(n) = raw.parse::<i64>() {
        return Bson::Int64(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Bson::Double(f);
    }
    match raw {
        "true" => Bson::Boolean(true),
        "false" => Bson::Boolean(false),
        _ => Bson::String(raw.to_string()),
    }
}

/// Response-side field selection: keep only the allowed keys (plus `id`).
pub fn apply_field_selection(value: &mut Value, fields: &[String]) {
    if let Value::Object(map) = value {
        map.retain(|key, _| key == "id" || fields.iter().any(|f| f == key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn params(pairs: &[(&str, &str)]) -> ListParams {
        ListParams::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_comparison_suffixes_are_rewritten() {
        let filter = params(&[("price[gte]", "100")]).filter_document();
        assert_eq!(filter, doc! { "price": { "$gte": 100_i64 } });

        let filter = params(&[("duration[lt]", "7")]).filter_document();
        assert_eq!(filter, doc! { "duration": { "$lt": 7_i64 } });
    }

    #[test]
    fn test_multiple_operators_on_one_field_merge() {
        let filter = params(&[("price[gte]", "100"), ("price[lte]", "500")]).filter_document();
        let price = filter.get_document("price").unwrap();
        assert_eq!(price.get_i64("$gte").unwrap(), 100);
        assert_eq!(price.get_i64("$lte").unwrap(), 500);
    }

    #[test]
    fn test_non_matching_keys_pass_through_unchanged() {
        let filter = params(&[("difficulty", "easy")]).filter_document();
        assert_eq!(filter, doc! { "difficulty": "easy" });

        // Unknown suffix is not a comparison; the key passes through whole.
        let filter = params(&[("price[near]", "100")]).filter_document();
        assert!(filter.contains_key("price[near]"));
    }

    #[test]
    fn test_reserved_keys_are_excluded_from_filters() {
        let filter = params(&[
            ("page", "2"),
            ("sort", "-price"),
            ("limit", "10"),
            ("fields", "name"),
            ("difficulty", "easy"),
        ])
        .filter_document();
        assert_eq!(filter, doc! { "difficulty": "easy" });
    }

    #[test]
    fn test_value_parsing() {
        let filter = params(&[
            ("duration", "5"),
            ("ratings_average", "4.7"),
            ("secret_tour", "false"),
            ("name", "The Forest Hiker"),
        ])
        .filter_document();
        assert_eq!(filter.get_i64("duration").unwrap(), 5);
        assert_eq!(filter.get_f64("ratings_average").unwrap(), 4.7);
        assert!(!filter.get_bool("secret_tour").unwrap());
        assert_eq!(filter.get_str("name").unwrap(), "The Forest Hiker");
    }

    #[test]
    fn test_sort_parses_direction_and_ties() {
        let sort = params(&[("sort", "-price,ratings_average")]).sort_document();
        let mut entries = sort.iter();
        let (first, dir) = entries.next().unwrap();
        assert_eq!(first, "price");
        assert_eq!(dir.as_i32().unwrap(), -1);
        let (second, dir) = entries.next().unwrap();
        assert_eq!(second, "ratings_average");
        assert_eq!(dir.as_i32().unwrap(), 1);
    }

    #[test]
    fn test_default_sort_is_newest_first() {
        let sort = params(&[]).sort_document();
        assert_eq!(sort, doc! { "created_at": -1 });
    }

    #[test]
    fn test_pagination_skip_math() {
        let (skip, limit) = params(&[("page", "2"), ("limit", "10")]).pagination();
        assert_eq!(skip, 10);
        assert_eq!(limit, 10);

        let (skip, limit) = params(&[("page", "3"), ("limit", "25")]).pagination();
        assert_eq!(skip, 50);
        assert_eq!(limit, 25);
    }

    #[test]
    fn test_pagination_defaults() {
        let (skip, limit) = params(&[]).pagination();
        assert_eq!(skip, 0);
        assert_eq!(limit, DEFAULT_LIMIT);

        // Garbage and zero fall back to defaults.
        let (skip, limit) = params(&[("page", "zero"), ("limit", "0")]).pagination();
        assert_eq!(skip, 0);
        assert_eq!(limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_fields_parsing() {
        let fields = params(&[("fields", "name,price, ratings_average")])
            .fields()
            .unwrap();
        assert_eq!(fields, vec!["name", "price", "ratings_average"]);
        assert!(params(&[]).fields().is_none());
    }

    #[test]
    fn test_field_selection_keeps_id_and_allowed_keys() {
        let mut value = serde_json::json!({
            "id": "abc",
            "name": "The Forest Hiker",
            "price": 397.0,
            "summary": "hidden"
        });
        apply_field_selection(&mut value, &["name".into(), "price".into()]);
        let map = value.as_object().unwrap();
        assert_eq!(map.len(), 3);
        assert!(map.contains_key("id"));
        assert!(map.contains_key("name"));
        assert!(!map.contains_key("summary"));
    }

    #[test]
    fn test_alias_presets_override() {
        let mut p = params(&[("limit", "50")]);
        p.set("limit", "5").set("sort", "-ratings_average,price");
        let (_, limit) = p.pagination();
        assert_eq!(limit, 5);
        assert_eq!(p.sort_document().get_i32("ratings_average").unwrap(), -1);
    }
}
