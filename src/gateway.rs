use crate::apis::GoogleMapsClient;
use crate::config::{ApiConfig, SearchParams};
use crate::error::{Result, ScraperError};
use crate::types::{NearbyPage, NearbyRequest, PlacesApi, RawPlace};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Wraps the places capability with pagination and the two-tier failure policy:
/// listing failures are fatal, detail failures degrade to "absent".
pub struct PlacesGateway {
    api: Arc<dyn PlacesApi>,
    page_token_delay: Duration,
}

impl PlacesGateway {
    /// Build a gateway backed by the Google Places web service.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = GoogleMapsClient::new(config).map_err(|e| {
            error!("Failed to initialize Google Maps client: {}", e);
            ScraperError::Api(e)
        })?;
        info!("Google Maps client initialized successfully");
        Ok(Self::with_api(Arc::new(client), config.page_token_delay))
    }

    pub fn with_api(api: Arc<dyn PlacesApi>, page_token_delay: Duration) -> Self {
        Self {
            api,
            page_token_delay,
        }
    }

    /// Run a nearby search and follow continuation tokens until the last page.
    ///
    /// Waits `page_token_delay` before each follow-up request. Any failure aborts the whole
    /// listing; no partial result is returned.
    #[instrument(skip(self, search), fields(api = self.api.api_name()))]
    pub async fn list_nearby(&self, search: &SearchParams) -> Result<Vec<RawPlace>> {
        info!(
            "Initiating nearby search: location=({}, {}), radius={}, type={}",
            search.latitude, search.longitude, search.radius_meters, search.business_type
        );

        let mut page = self
            .fetch_page(&NearbyRequest::Initial(search.clone()))
            .await?;
        debug!("Nearby search initial page returned {} results", page.results.len());
        let mut all_results = std::mem::take(&mut page.results);
        let mut pages = 1;

        while let Some(page_token) = page.next_page_token.take() {
            debug!("Fetching next page in {:?}", self.page_token_delay);
            tokio::time::sleep(self.page_token_delay).await;
            page = self
                .fetch_page(&NearbyRequest::NextPage { page_token })
                .await?;
            debug!("Nearby search next page returned {} results", page.results.len());
            all_results.append(&mut page.results);
            pages += 1;
        }

        info!(
            "Nearby search completed. Found {} total potential places across {} page(s)",
            all_results.len(),
            pages
        );
        metrics::histogram!("places_nearby_results").record(all_results.len() as f64);
        Ok(all_results)
    }

    async fn fetch_page(&self, request: &NearbyRequest) -> Result<NearbyPage> {
        self.api.nearby_page(request).await.map_err(|e| {
            error!("Places API error during nearby search: {}", e);
            ScraperError::Api(e)
        })
    }

    /// Fetch the detail payload for one place.
    ///
    /// Not-found and every other failure both yield `None`; the error is logged, never raised.
    #[instrument(skip(self), fields(api = self.api.api_name()))]
    pub async fn get_details(&self, place_id: &str) -> Option<RawPlace> {
        match self.api.place_details(place_id).await {
            Ok(Some(details)) => Some(details),
            Ok(None) => {
                warn!("Place {} was not found by the details endpoint", place_id);
                None
            }
            Err(e) => {
                let failure = ScraperError::DetailFetch {
                    place_id: place_id.to_string(),
                    reason: e.to_string(),
                };
                warn!("{}", failure);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, ApiResult};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedApi {
        pages: Mutex<VecDeque<ApiResult<NearbyPage>>>,
        requests: Mutex<Vec<NearbyRequest>>,
    }

    impl ScriptedApi {
        fn new(pages: Vec<ApiResult<NearbyPage>>) -> Arc<Self> {
            Arc::new(Self {
                pages: Mutex::new(pages.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<NearbyRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl PlacesApi for ScriptedApi {
        fn api_name(&self) -> &'static str {
            "scripted"
        }

        async fn nearby_page(&self, request: &NearbyRequest) -> ApiResult<NearbyPage> {
            self.requests.lock().unwrap().push(request.clone());
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(NearbyPage::default()))
        }

        async fn place_details(&self, place_id: &str) -> ApiResult<Option<RawPlace>> {
            match place_id {
                "MISSING" => Ok(None),
                "BROKEN" => Err(ApiError::Status {
                    status: "UNKNOWN_ERROR".to_string(),
                    message: "boom".to_string(),
                }),
                id => Ok(Some(json!({"place_id": id, "name": "Found"}))),
            }
        }
    }

    fn search() -> SearchParams {
        SearchParams {
            latitude: 1.0,
            longitude: 2.0,
            radius_meters: 100,
            business_type: "test".to_string(),
        }
    }

    fn page(ids: &[&str], token: Option<&str>) -> ApiResult<NearbyPage> {
        Ok(NearbyPage {
            results: ids
                .iter()
                .map(|id| json!({"place_id": id, "name": format!("Place {id}")}))
                .collect(),
            next_page_token: token.map(str::to_string),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_page_issues_one_request_without_waiting() {
        let api = ScriptedApi::new(vec![page(&["PLACE_A", "PLACE_B"], None)]);
        let gateway = PlacesGateway::with_api(api.clone(), Duration::from_secs(2));

        let start = tokio::time::Instant::now();
        let results = gateway.list_nearby(&search()).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["place_id"], "PLACE_A");
        assert_eq!(api.requests(), vec![NearbyRequest::Initial(search())]);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pagination_concatenates_pages_and_waits_between_requests() {
        let api = ScriptedApi::new(vec![
            page(&["PLACE_A", "PLACE_B"], Some("TOKEN_FOR_PAGE_2")),
            page(&["PLACE_C"], Some("TOKEN_FOR_PAGE_3")),
            page(&["PLACE_D"], None),
        ]);
        let gateway = PlacesGateway::with_api(api.clone(), Duration::from_secs(2));

        let start = tokio::time::Instant::now();
        let results = gateway.list_nearby(&search()).await.unwrap();

        let ids: Vec<&str> = results
            .iter()
            .map(|r| r["place_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["PLACE_A", "PLACE_B", "PLACE_C", "PLACE_D"]);
        assert_eq!(
            api.requests(),
            vec![
                NearbyRequest::Initial(search()),
                NearbyRequest::NextPage {
                    page_token: "TOKEN_FOR_PAGE_2".to_string()
                },
                NearbyRequest::NextPage {
                    page_token: "TOKEN_FOR_PAGE_3".to_string()
                },
            ]
        );
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_on_later_page_returns_no_partial_list() {
        let api = ScriptedApi::new(vec![
            page(&["PLACE_A"], Some("TOKEN_FOR_PAGE_2")),
            Err(ApiError::Status {
                status: "OVER_QUERY_LIMIT".to_string(),
                message: "quota".to_string(),
            }),
        ]);
        let gateway = PlacesGateway::with_api(api, Duration::from_secs(2));

        let err = gateway.list_nearby(&search()).await.unwrap_err();
        assert!(matches!(err, ScraperError::Api(ApiError::Status { .. })));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_get_details_degrades_failures_to_none() {
        let api = ScriptedApi::new(Vec::new());
        let gateway = PlacesGateway::with_api(api, Duration::ZERO);

        assert!(gateway.get_details("PLACE_A").await.is_some());
        assert!(gateway.get_details("MISSING").await.is_none());
        assert!(gateway.get_details("BROKEN").await.is_none());
    }

    #[test]
    fn test_new_fails_with_api_failure_for_blank_key() {
        let config = ApiConfig {
            api_key: String::new(),
            base_url: "https://example.com/place".to_string(),
            timeout: Duration::from_secs(1),
            page_token_delay: Duration::ZERO,
        };
        let err = PlacesGateway::new(&config).err().unwrap();
        assert!(matches!(err, ScraperError::Api(ApiError::InvalidCredential)));
    }
}
