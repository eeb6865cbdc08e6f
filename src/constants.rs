//! Defaults and fixed names shared across the crate.

use std::time::Duration;

// Places web service
pub const DEFAULT_API_BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";
pub const NEARBY_SEARCH_PATH: &str = "nearbysearch/json";
pub const PLACE_DETAILS_PATH: &str = "details/json";
pub const DETAIL_FIELDS: &str =
    "place_id,name,formatted_address,international_phone_number,types,website,url,geometry";

/// The service rejects a continuation token that is used too soon after it was issued.
pub const DEFAULT_PAGE_TOKEN_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_API_TIMEOUT_SECONDS: u64 = 10;

// Search defaults
pub const DEFAULT_RADIUS_METERS: u32 = 5000;
pub const DEFAULT_BUSINESS_TYPE: &str = "restaurant";

// Pipeline defaults
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const UNKNOWN_NAME: &str = "N/A";

// Storage
pub const CSV_STORAGE: &str = "csv";
pub const JSONL_STORAGE: &str = "jsonl";
pub const MEMORY_STORAGE: &str = "memory";
pub const DEFAULT_OUTPUT_PATH: &str = "businesses.csv";
pub const CATEGORY_DELIMITER: &str = ";";

pub const BASIC_COLUMNS: [&str; 5] = ["place_id", "name", "address", "phone_number", "categories"];
pub const EXTENDED_COLUMNS: [&str; 4] = ["website_url", "map_url", "latitude", "longitude"];

// Configuration
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const LOG_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "places_scraper.log";

/// Get all supported storage kinds
pub fn get_supported_storage() -> Vec<&'static str> {
    vec![CSV_STORAGE, JSONL_STORAGE, MEMORY_STORAGE]
}
