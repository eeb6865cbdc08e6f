use crate::constants::UNKNOWN_NAME;
use crate::error::ValidationError;
use crate::record::{BusinessRecord, RecordLayout};
use crate::types::RawPlace;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use url::Url;

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("valid regex"));

/// Which payload shape feeds the transformer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSchema {
    /// Fetch details per place and map the detail payload (address, phone, URLs, geometry).
    #[default]
    Details,
    /// Map nearby-search entries directly, without a detail fetch.
    Nearby,
}

impl SourceSchema {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceSchema::Details => "details",
            SourceSchema::Nearby => "nearby",
        }
    }

    pub fn fetches_details(&self) -> bool {
        matches!(self, SourceSchema::Details)
    }

    /// Tabular column layout that matches the fields this schema can populate.
    pub fn layout(&self) -> RecordLayout {
        match self {
            SourceSchema::Details => RecordLayout::Extended,
            SourceSchema::Nearby => RecordLayout::Basic,
        }
    }
}

impl fmt::Display for SourceSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "details" | "detail" => Ok(SourceSchema::Details),
            "nearby" | "list" => Ok(SourceSchema::Nearby),
            other => Err(format!(
                "Unsupported pipeline source: {other} (expected 'details' or 'nearby')"
            )),
        }
    }
}

/// Field names of one source payload shape
struct FieldMap {
    address: &'static str,
    phone_number: Option<&'static str>,
    website_url: Option<&'static str>,
    map_url: Option<&'static str>,
}

const DETAIL_PAYLOAD: FieldMap = FieldMap {
    address: "formatted_address",
    phone_number: Some("international_phone_number"),
    website_url: Some("website"),
    map_url: Some("url"),
};

const NEARBY_PAYLOAD: FieldMap = FieldMap {
    address: "vicinity",
    phone_number: None,
    website_url: None,
    map_url: None,
};

/// Pure mapping from a raw payload to a [`BusinessRecord`], or a rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordTransformer {
    schema: SourceSchema,
}

impl RecordTransformer {
    pub fn new(schema: SourceSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> SourceSchema {
        self.schema
    }

    pub fn transform(&self, raw: &RawPlace) -> Result<BusinessRecord, ValidationError> {
        let fields = match self.schema {
            SourceSchema::Details => &DETAIL_PAYLOAD,
            SourceSchema::Nearby => &NEARBY_PAYLOAD,
        };

        let place_id = required_place_id(raw)?;
        let name = optional_string(raw, "name", "name")?.unwrap_or_else(|| UNKNOWN_NAME.to_string());
        let address = optional_string(raw, fields.address, "address")?;
        let phone_number = match fields.phone_number {
            Some(key) => normalize_phone(optional_string(raw, key, "phone_number")?.as_deref()),
            None => None,
        };
        let categories = parse_categories(raw)?;
        let website_url = match fields.website_url {
            Some(key) => optional_url(raw, key, "website_url")?,
            None => None,
        };
        let map_url = match fields.map_url {
            Some(key) => optional_url(raw, key, "map_url")?,
            None => None,
        };
        let (latitude, longitude) = coordinates(raw)?;

        Ok(BusinessRecord {
            place_id,
            name,
            address,
            phone_number,
            categories,
            website_url,
            map_url,
            latitude,
            longitude,
        })
    }
}

/// Strip everything but ASCII digits. A value with no digits at all becomes absent.
pub fn normalize_phone(phone: Option<&str>) -> Option<String> {
    phone
        .map(|p| NON_DIGITS.replace_all(p, "").into_owned())
        .filter(|digits| !digits.is_empty())
}

fn required_place_id(raw: &RawPlace) -> Result<String, ValidationError> {
    match raw.get("place_id") {
        None | Some(Value::Null) => Err(ValidationError::MissingPlaceId),
        Some(Value::String(id)) if id.trim().is_empty() => Err(ValidationError::MissingPlaceId),
        Some(Value::String(id)) => Ok(id.clone()),
        Some(other) => Err(ValidationError::invalid(
            "place_id",
            format!("expected a string, got {other}"),
        )),
    }
}

fn optional_string(
    raw: &RawPlace,
    key: &str,
    field: &'static str,
) -> Result<Option<String>, ValidationError> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ValidationError::invalid(
            field,
            format!("expected a string, got {other}"),
        )),
    }
}

fn optional_url(
    raw: &RawPlace,
    key: &str,
    field: &'static str,
) -> Result<Option<String>, ValidationError> {
    let Some(value) = optional_string(raw, key, field)? else {
        return Ok(None);
    };
    let url = Url::parse(&value)
        .map_err(|e| ValidationError::invalid(field, format!("'{value}' is not a URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::invalid(
            field,
            format!("'{value}' is not an http(s) URL"),
        ));
    }
    Ok(Some(url.to_string()))
}

fn parse_categories(raw: &RawPlace) -> Result<Vec<String>, ValidationError> {
    match raw.get("types") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ValidationError::invalid(
                        "categories",
                        format!("item {i} should be a valid string, got {item}"),
                    )
                })
            })
            .collect(),
        Some(other) => Err(ValidationError::invalid(
            "categories",
            format!("expected a list, got {other}"),
        )),
    }
}

fn coordinates(raw: &RawPlace) -> Result<(Option<f64>, Option<f64>), ValidationError> {
    let location = &raw["geometry"]["location"];
    if location.is_null() {
        return Ok((None, None));
    }
    let latitude = coordinate(location, "lat", "latitude", 90.0)?;
    let longitude = coordinate(location, "lng", "longitude", 180.0)?;
    Ok((latitude, longitude))
}

fn coordinate(
    location: &Value,
    key: &str,
    field: &'static str,
    bound: f64,
) -> Result<Option<f64>, ValidationError> {
    match location.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let v = value.as_f64().ok_or_else(|| {
                ValidationError::invalid(field, format!("expected a number, got {value}"))
            })?;
            if v.abs() > bound {
                return Err(ValidationError::invalid(
                    field,
                    format!("{v} is outside [-{bound}, {bound}]"),
                ));
            }
            Ok(Some(v))
        }
    }
}
