use crate::config::ApiConfig;
use crate::constants::{DETAIL_FIELDS, NEARBY_SEARCH_PATH, PLACE_DETAILS_PATH};
use crate::error::{ApiError, ApiResult};
use crate::types::{NearbyPage, NearbyRequest, PlacesApi, RawPlace};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

/// Client for the Google Places web service (nearby search + place details).
pub struct GoogleMapsClient {
    client: reqwest::Client,
    api_key: String,
    base_url: Url,
}

impl GoogleMapsClient {
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ApiError::InvalidCredential);
        }
        let base_url = parse_base_url(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        debug!("Google Maps client initialized for {}", base_url);
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url,
        })
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidEndpoint {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    fn nearby_url(&self, request: &NearbyRequest) -> ApiResult<Url> {
        let mut url = self.endpoint(NEARBY_SEARCH_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            match request {
                NearbyRequest::Initial(search) => {
                    query
                        .append_pair(
                            "location",
                            &format!("{},{}", search.latitude, search.longitude),
                        )
                        .append_pair("radius", &search.radius_meters.to_string())
                        .append_pair("type", &search.business_type);
                }
                NearbyRequest::NextPage { page_token } => {
                    query.append_pair("pagetoken", page_token);
                }
            }
            query.append_pair("key", &self.api_key);
        }
        Ok(url)
    }

    fn details_url(&self, place_id: &str) -> ApiResult<Url> {
        let mut url = self.endpoint(PLACE_DETAILS_PATH)?;
        url.query_pairs_mut()
            .append_pair("place_id", place_id)
            .append_pair("fields", DETAIL_FIELDS)
            .append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> ApiResult<Value> {
        // Strip the URL from transport errors; it carries the API key.
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.without_url())?
            .error_for_status()
            .map_err(|e| e.without_url())?;
        let body = response.json::<Value>().await.map_err(|e| e.without_url())?;
        Ok(body)
    }
}

#[async_trait::async_trait]
impl PlacesApi for GoogleMapsClient {
    fn api_name(&self) -> &'static str {
        "google_places"
    }

    #[instrument(skip(self, request))]
    async fn nearby_page(&self, request: &NearbyRequest) -> ApiResult<NearbyPage> {
        let url = self.nearby_url(request)?;
        let body = self.get_json(url).await?;
        parse_nearby_page(body)
    }

    #[instrument(skip(self))]
    async fn place_details(&self, place_id: &str) -> ApiResult<Option<RawPlace>> {
        let url = self.details_url(place_id)?;
        let body = self.get_json(url).await?;
        parse_place_details(body)
    }
}

fn parse_base_url(raw: &str) -> ApiResult<Url> {
    let invalid = |reason: String| ApiError::InvalidEndpoint {
        url: raw.to_string(),
        reason,
    };
    let mut url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(invalid("expected an http(s) base URL".to_string()));
    }
    // Url::join replaces the last segment unless the base path ends in '/'
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn response_status(body: &Value) -> ApiResult<&str> {
    body["status"]
        .as_str()
        .ok_or_else(|| ApiError::Decode("response has no status field".to_string()))
}

fn status_error(status: &str, body: &Value) -> ApiError {
    ApiError::Status {
        status: status.to_string(),
        message: body["error_message"]
            .as_str()
            .unwrap_or("no error message")
            .to_string(),
    }
}

/// Interpret a nearby-search response body.
pub fn parse_nearby_page(body: Value) -> ApiResult<NearbyPage> {
    match response_status(&body)? {
        "OK" => {}
        "ZERO_RESULTS" => return Ok(NearbyPage::default()),
        other => return Err(status_error(other, &body)),
    }

    let results = match &body["results"] {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        _ => return Err(ApiError::Decode("'results' is not an array".to_string())),
    };
    let next_page_token = body["next_page_token"]
        .as_str()
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    Ok(NearbyPage {
        results,
        next_page_token,
    })
}

/// Interpret a place-details response body. A not-found status is `Ok(None)`.
pub fn parse_place_details(body: Value) -> ApiResult<Option<RawPlace>> {
    match response_status(&body)? {
        "OK" => {}
        "NOT_FOUND" | "ZERO_RESULTS" => return Ok(None),
        other => return Err(status_error(other, &body)),
    }

    match body.get("result") {
        Some(result @ Value::Object(_)) => Ok(Some(result.clone())),
        _ => Err(ApiError::Decode("'result' is not an object".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchParams;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    fn api_config(key: &str, base_url: &str) -> ApiConfig {
        ApiConfig {
            api_key: key.to_string(),
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(5),
            page_token_delay: Duration::from_secs(2),
        }
    }

    fn query_of(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_new_rejects_blank_key() {
        let result = GoogleMapsClient::new(&api_config(" ", "https://example.com/place"));
        assert!(matches!(result, Err(ApiError::InvalidCredential)));
    }

    #[test]
    fn test_new_rejects_bad_endpoint() {
        let result = GoogleMapsClient::new(&api_config("key", "not a url"));
        assert!(matches!(result, Err(ApiError::InvalidEndpoint { .. })));

        let result = GoogleMapsClient::new(&api_config("key", "ftp://example.com/place"));
        assert!(matches!(result, Err(ApiError::InvalidEndpoint { .. })));
    }

    #[test]
    fn test_initial_nearby_url() {
        let client =
            GoogleMapsClient::new(&api_config("fake_key", "https://example.com/maps/api/place"))
                .unwrap();
        let url = client
            .nearby_url(&NearbyRequest::Initial(SearchParams {
                latitude: 1.0,
                longitude: 2.5,
                radius_meters: 100,
                business_type: "test".to_string(),
            }))
            .unwrap();

        assert_eq!(url.path(), "/maps/api/place/nearbysearch/json");
        let query = query_of(&url);
        assert_eq!(query["location"], "1,2.5");
        assert_eq!(query["radius"], "100");
        assert_eq!(query["type"], "test");
        assert_eq!(query["key"], "fake_key");
        assert!(!query.contains_key("pagetoken"));
    }

    #[test]
    fn test_next_page_url_only_carries_token() {
        let client = GoogleMapsClient::new(&api_config("fake_key", "https://example.com/place/"))
            .unwrap();
        let url = client
            .nearby_url(&NearbyRequest::NextPage {
                page_token: "TOKEN_FOR_PAGE_2".to_string(),
            })
            .unwrap();

        let query = query_of(&url);
        assert_eq!(query["pagetoken"], "TOKEN_FOR_PAGE_2");
        assert!(!query.contains_key("location"));
        assert_eq!(url.path(), "/place/nearbysearch/json");
    }

    #[test]
    fn test_details_url_requests_field_mask() {
        let client = GoogleMapsClient::new(&api_config("fake_key", "https://example.com/place"))
            .unwrap();
        let url = client.details_url("PLACE_A").unwrap();
        let query = query_of(&url);
        assert_eq!(query["place_id"], "PLACE_A");
        assert_eq!(query["fields"], DETAIL_FIELDS);
    }

    #[test]
    fn test_parse_nearby_page_with_token() {
        let page = parse_nearby_page(json!({
            "results": [
                {"place_id": "PLACE_A", "name": "Place A"},
                {"place_id": "PLACE_B", "name": "Place B"}
            ],
            "next_page_token": "TOKEN_FOR_PAGE_2",
            "status": "OK"
        }))
        .unwrap();

        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[1]["place_id"], "PLACE_B");
        assert_eq!(page.next_page_token.as_deref(), Some("TOKEN_FOR_PAGE_2"));
    }

    #[test]
    fn test_parse_nearby_page_last_page_and_zero_results() {
        let page = parse_nearby_page(json!({
            "results": [{"place_id": "PLACE_C", "name": "Place C"}],
            "next_page_token": null,
            "status": "OK"
        }))
        .unwrap();
        assert_eq!(page.next_page_token, None);

        let page = parse_nearby_page(json!({"results": [], "status": "ZERO_RESULTS"})).unwrap();
        assert_eq!(page, NearbyPage::default());
    }

    #[test]
    fn test_parse_nearby_page_error_statuses() {
        for status in ["REQUEST_DENIED", "OVER_QUERY_LIMIT", "INVALID_REQUEST", "UNKNOWN_ERROR"] {
            let err = parse_nearby_page(json!({
                "status": status,
                "error_message": "The provided API key is invalid."
            }))
            .unwrap_err();
            match err {
                ApiError::Status { status: got, message } => {
                    assert_eq!(got, status);
                    assert!(message.contains("API key"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        assert!(matches!(
            parse_nearby_page(json!({"results": []})),
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_place_details() {
        let details = parse_place_details(json!({
            "status": "OK",
            "result": {"place_id": "PLACE_A", "name": "Place A"}
        }))
        .unwrap()
        .unwrap();
        assert_eq!(details["name"], "Place A");

        assert_eq!(parse_place_details(json!({"status": "NOT_FOUND"})).unwrap(), None);
        assert!(parse_place_details(json!({"status": "OVER_QUERY_LIMIT"})).is_err());
        assert!(matches!(
            parse_place_details(json!({"status": "OK", "result": []})),
            Err(ApiError::Decode(_))
        ));
    }
}
