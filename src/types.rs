use crate::config::SearchParams;
use crate::constants::UNKNOWN_NAME;
use crate::error::ApiResult;

/// Raw place payload as returned by the places service (list entry or detail result)
pub type RawPlace = serde_json::Value;

/// Minimal identifying view of a nearby-search entry. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceReference {
    pub place_id: Option<String>,
    pub name: String,
}

impl PlaceReference {
    pub fn from_raw(raw: &RawPlace) -> Self {
        let place_id = raw["place_id"]
            .as_str()
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string);
        let name = raw["name"].as_str().unwrap_or(UNKNOWN_NAME).to_string();
        Self { place_id, name }
    }
}

/// One request against the nearby-search endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum NearbyRequest {
    Initial(SearchParams),
    NextPage { page_token: String },
}

/// One page of nearby-search results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NearbyPage {
    pub results: Vec<RawPlace>,
    pub next_page_token: Option<String>,
}

/// The external places capability the gateway drives.
///
/// Implementations issue exactly one network call per method invocation; pagination and
/// failure policy live in [`crate::gateway::PlacesGateway`].
#[async_trait::async_trait]
pub trait PlacesApi: Send + Sync {
    /// Short identifier used in logs and metrics
    fn api_name(&self) -> &'static str;

    /// Fetch a single nearby-search page
    async fn nearby_page(&self, request: &NearbyRequest) -> ApiResult<NearbyPage>;

    /// Fetch details for one place. `Ok(None)` means the service reported it as not found.
    async fn place_details(&self, place_id: &str) -> ApiResult<Option<RawPlace>>;
}
