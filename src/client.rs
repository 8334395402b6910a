use std::sync::{PoisonError, RwLock};

use serde::Serialize;

use crate::{
    cache::ResultCache,
    eval::{resolve_name, Resolution},
    ClientConfig, ConfigValue, ContextValue, EvaluateRequest, EvaluationContext, EvaluationError,
    Error, HttpFetcher, RemoteFetcher, Result,
};

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadedFrom {
    /// Value previously fetched from the server and kept in memory.
    MemoryCache,
    /// Fresh value from the server.
    Server,
    /// Default value supplied by the caller.
    Default,
}

/// A config to resolve together with the value to fall back to.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRequest<T = ConfigValue> {
    /// Remote config name.
    pub name: String,
    /// Value used when neither the server nor the cache can provide one.
    pub default: T,
}

impl<T> ConfigRequest<T> {
    /// Create a new request.
    ///
    /// ```
    /// # use tweakship::ConfigRequest;
    /// let request: ConfigRequest = ConfigRequest::new("banner_text", "Welcome!");
    /// ```
    pub fn new(name: impl Into<String>, default: impl Into<T>) -> Self {
        ConfigRequest {
            name: name.into(),
            default: default.into(),
        }
    }
}

/// Result of resolving a single config.
///
/// A result always carries a usable value. `error` is set only when a server-backed resolution did
/// not produce a fresh value for this name.
#[derive(Debug, Clone)]
pub struct ConfigResult<T = ConfigValue> {
    /// Remote config name.
    pub name: String,
    /// Resolved value.
    pub value: T,
    /// Source of `value`.
    pub loaded_from: LoadedFrom,
    /// Why the server did not provide a fresh value.
    pub error: Option<EvaluationError>,
}

impl ConfigResult {
    fn with_error(mut self, error: EvaluationError) -> Self {
        self.error = Some(error);
        self
    }

    /// Narrow the result to a feature toggle. Non-boolean values fall back to `default`; a
    /// non-boolean value fresh from the server is annotated with [`EvaluationError::TypeMismatch`].
    fn into_toggle(self, default: bool) -> ConfigResult<bool> {
        let (value, loaded_from, error) = match self.value.as_boolean() {
            Some(value) => (value, self.loaded_from, self.error),
            None => {
                log::warn!(target: "tweakship",
                           name = self.name.as_str(),
                           value:serde = self.value;
                           "feature toggle has non-boolean value, using default");
                let error = match self.loaded_from {
                    LoadedFrom::Server => Some(EvaluationError::TypeMismatch),
                    _ => self.error,
                };
                (default, LoadedFrom::Default, error)
            }
        };

        ConfigResult {
            name: self.name,
            value,
            loaded_from,
            error,
        }
    }
}

/// A client that provides and caches Remote Configs and Feature Toggles.
///
/// The client must be configured with [`Client::configure`] before any server-backed (`*_async`)
/// call. Synchronous calls never touch the network: they return the last value fetched from the
/// server, or the default if nothing was fetched yet under the current context.
///
/// All methods take `&self`, so a single client can be shared between tasks. Overlapping
/// resolution calls are not ordered against each other: the call that completes last wins the
/// cache.
///
/// # Examples
/// ```no_run
/// # use tweakship::{Client, ClientConfig};
/// # async fn run() -> tweakship::Result<()> {
/// let client = Client::default();
/// client
///     .configure(ClientConfig::new("https://tweakship.example.com", "project-id"))
///     .set_context([("country", "NZ")]);
///
/// let banner = client.get_remote_config_async("banner_text", "Welcome!").await?;
/// let dark_mode = client.get_feature_toggle("dark_mode", false);
/// # Ok(())
/// # }
/// ```
pub struct Client<'a> {
    fetcher: Box<dyn RemoteFetcher + Send + Sync + 'a>,
    config: RwLock<Option<ClientConfig>>,
    context: RwLock<EvaluationContext>,
    cache: ResultCache,
}

impl Default for Client<'static> {
    /// Create an unconfigured client sending requests over HTTP.
    fn default() -> Self {
        Client::new(HttpFetcher::new())
    }
}

impl<'a> Client<'a> {
    /// Create an unconfigured client using `fetcher` to reach the server.
    pub fn new(fetcher: impl RemoteFetcher + Send + Sync + 'a) -> Self {
        Client {
            fetcher: Box::new(fetcher),
            config: RwLock::new(None),
            context: RwLock::new(EvaluationContext::default()),
            cache: ResultCache::new(),
        }
    }

    /// Set server configuration. May be called again to reconfigure; the cache is kept.
    pub fn configure(&self, config: ClientConfig) -> &Self {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Some(config);
        self
    }

    /// Set current user or system context used by the server to evaluate Remote Configs.
    ///
    /// Scalar values are wrapped into single-element lists and dates are converted to ISO-8601
    /// UTC strings. Clears all cached values, as they were resolved under the previous context.
    /// Calls already in flight keep the context they were dispatched with.
    pub fn set_context<K, V>(&self, context: impl IntoIterator<Item = (K, V)>) -> &Self
    where
        K: Into<String>,
        V: Into<ContextValue>,
    {
        let context = context.into_iter().collect::<EvaluationContext>();
        *self.context.write().unwrap_or_else(PoisonError::into_inner) = context;
        self.cache.clear();
        log::debug!(target: "tweakship", "evaluation context changed, cleared cached remote configs");
        self
    }

    fn config(&self) -> Option<ClientConfig> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Currently active evaluation context.
    pub fn context(&self) -> EvaluationContext {
        self.context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get a Remote Config value WITHOUT loading the latest value from the server.
    ///
    /// The value is taken from memory cache, or `default` if the cache is empty. Useful when all
    /// configs are preloaded at start-up.
    pub fn get_remote_config(&self, name: &str, default: impl Into<ConfigValue>) -> ConfigResult {
        self.resolve_local(ConfigRequest::new(name, default))
    }

    /// Get a Feature Toggle value WITHOUT loading the latest value from the server.
    pub fn get_feature_toggle(&self, name: &str, default: bool) -> ConfigResult<bool> {
        self.get_remote_config(name, default).into_toggle(default)
    }

    /// Load a Remote Config from the server.
    ///
    /// If loading fails, returns the value from memory cache or `default`, together with the
    /// error. Fails only with [`Error::NotConfigured`] or [`Error::InvalidJsonValue`].
    pub async fn get_remote_config_async(
        &self,
        name: &str,
        default: impl Into<ConfigValue>,
    ) -> Result<ConfigResult> {
        let mut results = self
            .resolve_remote(vec![ConfigRequest::new(name, default)])
            .await?;
        // resolve_remote returns exactly one result per request.
        Ok(results.remove(0))
    }

    /// Load a Feature Toggle from the server. See [`Client::get_remote_config_async`].
    pub async fn get_feature_toggle_async(
        &self,
        name: &str,
        default: bool,
    ) -> Result<ConfigResult<bool>> {
        let result = self.get_remote_config_async(name, default).await?;
        Ok(result.into_toggle(default))
    }

    /// Load multiple Remote Configs from the server in a single request.
    ///
    /// Results are returned in request order. See [`Client::get_remote_config_async`].
    pub async fn get_multiple_remote_configs_async(
        &self,
        requests: impl IntoIterator<Item = ConfigRequest>,
    ) -> Result<Vec<ConfigResult>> {
        self.resolve_remote(requests.into_iter().collect()).await
    }

    /// Load multiple Feature Toggles from the server in a single request.
    pub async fn get_multiple_feature_toggles_async(
        &self,
        requests: impl IntoIterator<Item = ConfigRequest<bool>>,
    ) -> Result<Vec<ConfigResult<bool>>> {
        let (defaults, requests): (Vec<bool>, Vec<ConfigRequest>) = requests
            .into_iter()
            .map(|request| {
                (
                    request.default,
                    ConfigRequest::new(request.name, request.default),
                )
            })
            .unzip();

        let results = self.resolve_remote(requests).await?;
        Ok(results
            .into_iter()
            .zip(defaults)
            .map(|(result, default)| result.into_toggle(default))
            .collect())
    }

    fn resolve_local(&self, request: ConfigRequest) -> ConfigResult {
        let (value, loaded_from) = match self.cache.get(&request.name) {
            Some(cached) => (cached, LoadedFrom::MemoryCache),
            None => (request.default, LoadedFrom::Default),
        };

        log::trace!(target: "tweakship",
                    name = request.name.as_str(),
                    loaded_from:serde;
                    "resolved remote config locally");

        ConfigResult {
            name: request.name,
            value,
            loaded_from,
            error: None,
        }
    }

    /// Resolve `requests` with a single server call, degrading to cache or default per name.
    async fn resolve_remote(&self, requests: Vec<ConfigRequest>) -> Result<Vec<ConfigResult>> {
        let Some(config) = self.config() else {
            log::warn!(target: "tweakship", "loading remote configs before the client has been configured");
            return Err(Error::NotConfigured);
        };

        let body = EvaluateRequest {
            context: self.context(),
            names: requests.iter().map(|request| request.name.clone()).collect(),
        };

        log::debug!(target: "tweakship", names:serde = body.names; "evaluating remote configs");
        let response = match self.fetcher.fetch(&config.evaluate_url(), &body).await {
            Ok(response) => response,
            Err(err) => {
                log::warn!(target: "tweakship", "failed to load remote configs, using cached or default values: {}", err);
                return Ok(requests
                    .into_iter()
                    .map(|request| {
                        self.resolve_local(request)
                            .with_error(EvaluationError::FetchFailed(err.clone()))
                    })
                    .collect());
            }
        };

        let outcomes = response.outcomes_by_name();

        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let result = match resolve_name(&outcomes, &request.name)? {
                Resolution::Fresh(value) => ConfigResult {
                    name: request.name,
                    value,
                    loaded_from: LoadedFrom::Server,
                    error: None,
                },
                Resolution::Degraded(error) => self.resolve_local(request).with_error(error),
            };

            log::trace!(target: "tweakship",
                        name = result.name.as_str(),
                        loaded_from:serde = result.loaded_from;
                        "resolved remote config");
            results.push(result);
        }

        // Values are cached only once the whole batch parsed, so a malformed value leaves the cache
        // untouched.
        for result in &results {
            if result.loaded_from == LoadedFrom::Server {
                self.cache.set(&result.name, result.value.clone());
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use crate::{
        ClientConfig, ConfigRequest, ConfigValue, ContextValue, EvaluateRequest, EvaluateResponse,
        EvaluationError, EvaluationResult, Error, RemoteFetcher, Result, ValueType,
    };

    use super::{Client, LoadedFrom};

    type Calls = Arc<Mutex<Vec<(String, EvaluateRequest)>>>;

    /// Replays queued responses and records every call.
    struct StubFetcher {
        responses: Mutex<VecDeque<Result<EvaluateResponse>>>,
        calls: Calls,
    }

    #[async_trait]
    impl RemoteFetcher for StubFetcher {
        async fn fetch(&self, url: &str, body: &EvaluateRequest) -> Result<EvaluateResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_owned(), body.clone()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(EvaluateResponse::default()))
        }
    }

    fn client(responses: impl IntoIterator<Item = Result<EvaluateResponse>>) -> (Client<'static>, Calls) {
        let _ = env_logger::builder().is_test(true).try_init();

        let calls = Calls::default();
        let fetcher = StubFetcher {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: calls.clone(),
        };
        (Client::new(fetcher), calls)
    }

    fn config() -> ClientConfig {
        ClientConfig::new("https://host", "project")
    }

    fn text(name: &str, value: &str) -> EvaluationResult {
        EvaluationResult::success(name, ValueType::Text, value)
    }

    #[tokio::test]
    async fn fails_if_not_configured() {
        let (client, calls) = client([]);

        let err = client.get_remote_config_async("r1", "client").await.unwrap_err();
        assert!(matches!(err, Error::NotConfigured));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn uses_default_for_sync_call_if_not_loaded_before() {
        let (client, _) = client([]);
        client.configure(config());

        let result = client.get_remote_config("r1", "client");
        assert_eq!(result.name, "r1");
        assert_eq!(result.value, ConfigValue::Text("client".to_owned()));
        assert_eq!(result.loaded_from, LoadedFrom::Default);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn sends_single_batched_request() {
        let (client, calls) = client([]);
        client.configure(config());

        client
            .get_multiple_remote_configs_async([
                ConfigRequest::new("r1", "a"),
                ConfigRequest::new("r2", 1),
                ConfigRequest::new("r3", false),
            ])
            .await
            .unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].0,
            "https://host/api/client/projects/project/remoteConfigs/evaluate"
        );
        assert_eq!(calls[0].1.names, ["r1", "r2", "r3"]);
    }

    #[tokio::test]
    async fn passes_context() {
        let (client, calls) = client([]);
        client.configure(config()).set_context([
            ("value1", ContextValue::from(vec!["v1"])),
            ("value2", 1.into()),
            ("value3", false.into()),
        ]);

        client.get_remote_config_async("r1", "client").await.unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(
            serde_json::to_value(&calls[0].1).unwrap(),
            json!({
                "context": {
                    "value1": ["v1"],
                    "value2": [1.0],
                    "value3": [false],
                },
                "names": ["r1"],
            })
        );
    }

    #[tokio::test]
    async fn converts_dates_in_context_to_iso_string() {
        let (client, calls) = client([]);
        let date = Utc.with_ymd_and_hms(2020, 11, 8, 23, 10, 20).unwrap();
        client
            .configure(config())
            .set_context([("value1", ContextValue::from(vec![date])), ("value2", date.into())]);

        client.get_remote_config_async("r1", "client").await.unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(
            serde_json::to_value(&calls[0].1.context).unwrap(),
            json!({
                "value1": ["2020-11-08T23:10:20.000Z"],
                "value2": ["2020-11-08T23:10:20.000Z"],
            })
        );
    }

    #[tokio::test]
    async fn uses_cached_value_for_sync_call_if_loaded_before() {
        let (client, _) = client([Ok(EvaluateResponse::new([text("r1", "server")]))]);
        client.configure(config());

        let fetched = client.get_remote_config_async("r1", "client").await.unwrap();
        assert_eq!(fetched.loaded_from, LoadedFrom::Server);

        let result = client.get_remote_config("r1", "client");
        assert_eq!(result.value, ConfigValue::Text("server".to_owned()));
        assert_eq!(result.loaded_from, LoadedFrom::MemoryCache);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn uses_default_if_nothing_loaded() {
        let (client, _) = client([]);
        client.configure(config());

        let result = client.get_remote_config_async("r1", "client").await.unwrap();
        assert_eq!(result.value, ConfigValue::Text("client".to_owned()));
        assert_eq!(result.loaded_from, LoadedFrom::Default);
        assert!(matches!(result.error, Some(EvaluationError::ConfigNotFound)));
    }

    #[tokio::test]
    async fn uses_default_if_failed_to_load_all_configs() {
        let (client, _) = client([Err(Error::Fetch("Failed to load".to_owned()))]);
        client.configure(config());

        let result = client.get_remote_config_async("r1", "client").await.unwrap();
        assert_eq!(result.value, ConfigValue::Text("client".to_owned()));
        assert_eq!(result.loaded_from, LoadedFrom::Default);
        assert_eq!(result.error.unwrap().to_string(), "Failed to load");
    }

    #[tokio::test]
    async fn annotates_every_result_on_transport_failure() {
        let (client, _) = client([
            Ok(EvaluateResponse::new([text("r1", "server")])),
            Err(Error::Fetch("Failed to load".to_owned())),
        ]);
        client.configure(config());
        client.get_remote_config_async("r1", "client").await.unwrap();

        let results = client
            .get_multiple_remote_configs_async([
                ConfigRequest::new("r1", "client"),
                ConfigRequest::new("r2", 2),
            ])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].loaded_from, LoadedFrom::MemoryCache);
        assert_eq!(results[0].value, ConfigValue::Text("server".to_owned()));
        assert_eq!(results[1].loaded_from, LoadedFrom::Default);
        assert_eq!(results[1].value, ConfigValue::Number(2.0));
        for result in &results {
            assert!(matches!(
                &result.error,
                Some(EvaluationError::FetchFailed(Error::Fetch(message))) if message == "Failed to load"
            ));
        }
    }

    #[tokio::test]
    async fn uses_default_if_failed_to_load_some_configs() {
        let (client, _) = client([Ok(EvaluateResponse::new([
            text("r1", "server"),
            EvaluationResult::fail("r2", "ServerError"),
        ]))]);
        client.configure(config());

        let results = client
            .get_multiple_remote_configs_async([
                ConfigRequest::new("r1", "client"),
                ConfigRequest::new("r2", 1),
            ])
            .await
            .unwrap();

        assert_eq!(results[0].value, ConfigValue::Text("server".to_owned()));
        assert_eq!(results[0].loaded_from, LoadedFrom::Server);
        assert!(results[0].error.is_none());

        assert_eq!(results[1].value, ConfigValue::Number(1.0));
        assert_eq!(results[1].loaded_from, LoadedFrom::Default);
        assert_eq!(results[1].error.as_ref().unwrap().to_string(), "ServerError");
    }

    #[tokio::test]
    async fn uses_cached_value_if_failed_to_load_next_time() {
        let (client, _) = client([
            Ok(EvaluateResponse::new([text("r1", "server")])),
            Ok(EvaluateResponse::default()),
        ]);
        client.configure(config());

        client.get_remote_config_async("r1", "clientValue").await.unwrap();
        let result = client.get_remote_config_async("r1", "clientValue").await.unwrap();

        assert_eq!(result.value, ConfigValue::Text("server".to_owned()));
        assert_eq!(result.loaded_from, LoadedFrom::MemoryCache);
        assert!(matches!(result.error, Some(EvaluationError::ConfigNotFound)));
    }

    #[tokio::test]
    async fn server_then_memory_cache_with_identical_value() {
        let (client, _) = client([Ok(EvaluateResponse::new([EvaluationResult::success(
            "r1",
            ValueType::Json,
            r#"{"prop":10}"#,
        )]))]);
        client.configure(config());

        let first = client.get_remote_config_async("r1", json!({})).await.unwrap();
        let second = client.get_remote_config("r1", json!({}));

        assert_eq!(first.loaded_from, LoadedFrom::Server);
        assert_eq!(second.loaded_from, LoadedFrom::MemoryCache);
        assert_eq!(first.value, second.value);
    }

    #[tokio::test]
    async fn set_context_clears_cache() {
        let (client, _) = client([Ok(EvaluateResponse::new([text("r1", "server")]))]);
        client.configure(config());
        client.get_remote_config_async("r1", "client").await.unwrap();

        client.set_context([("country", "NZ")]);

        let result = client.get_remote_config("r1", "client");
        assert_eq!(result.loaded_from, LoadedFrom::Default);
        assert_eq!(result.value, ConfigValue::Text("client".to_owned()));
    }

    #[tokio::test]
    async fn caches_falsy_server_values() {
        let (client, _) = client([Ok(EvaluateResponse::new([
            EvaluationResult::success("zero", ValueType::Number, "0"),
            EvaluationResult::success("off", ValueType::Boolean, "false"),
            text("empty", ""),
        ]))]);
        client.configure(config());
        client
            .get_multiple_remote_configs_async([
                ConfigRequest::new("zero", 5),
                ConfigRequest::new("off", true),
                ConfigRequest::new("empty", "default"),
            ])
            .await
            .unwrap();

        assert_eq!(client.get_remote_config("zero", 5).value, ConfigValue::Number(0.0));
        assert_eq!(client.get_remote_config("off", true).value, ConfigValue::Boolean(false));
        assert_eq!(
            client.get_remote_config("empty", "default").loaded_from,
            LoadedFrom::MemoryCache
        );
    }

    #[tokio::test]
    async fn does_not_cache_degraded_values() {
        let (client, _) = client([Ok(EvaluateResponse::new([EvaluationResult::fail(
            "r1",
            "ServerError",
        )]))]);
        client.configure(config());
        client.get_remote_config_async("r1", "client").await.unwrap();

        assert_eq!(client.get_remote_config("r1", "other").loaded_from, LoadedFrom::Default);
    }

    #[tokio::test]
    async fn malformed_json_fails_the_batch_and_keeps_cache() {
        let (client, _) = client([Ok(EvaluateResponse::new([
            text("r1", "server"),
            EvaluationResult::success("r2", ValueType::Json, "{prop:"),
        ]))]);
        client.configure(config());

        let err = client
            .get_multiple_remote_configs_async([
                ConfigRequest::new("r1", "client"),
                ConfigRequest::new("r2", json!({})),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidJsonValue { name, .. } if name == "r2"));
        assert_eq!(client.get_remote_config("r1", "client").loaded_from, LoadedFrom::Default);
    }

    #[tokio::test]
    async fn cache_is_not_type_checked() {
        let (client, _) = client([Ok(EvaluateResponse::new([text("r1", "server")]))]);
        client.configure(config());
        client.get_remote_config_async("r1", "client").await.unwrap();

        let result = client.get_remote_config("r1", 42);
        assert_eq!(result.loaded_from, LoadedFrom::MemoryCache);
        assert_eq!(result.value, ConfigValue::Text("server".to_owned()));
    }

    #[tokio::test]
    async fn feature_toggle_with_non_boolean_value_uses_default() {
        let (client, _) = client([Ok(EvaluateResponse::new([text("t1", "on")]))]);
        client.configure(config());

        let result = client.get_feature_toggle_async("t1", true).await.unwrap();
        assert!(result.value);
        assert_eq!(result.loaded_from, LoadedFrom::Default);
        assert!(matches!(result.error, Some(EvaluationError::TypeMismatch)));
        assert_eq!(result.error.unwrap().to_string(), "TypeMismatch");

        // The cached value is still not a boolean, but local reads carry no annotation.
        let cached = client.get_feature_toggle("t1", false);
        assert!(!cached.value);
        assert_eq!(cached.loaded_from, LoadedFrom::Default);
        assert!(cached.error.is_none());
    }

    #[tokio::test]
    async fn feature_toggle_keeps_fetch_error_for_non_boolean_cached_value() {
        let (client, _) = client([
            Ok(EvaluateResponse::new([text("t1", "on")])),
            Ok(EvaluateResponse::default()),
        ]);
        client.configure(config());
        client.get_remote_config_async("t1", "client").await.unwrap();

        let result = client.get_feature_toggle_async("t1", true).await.unwrap();
        assert!(result.value);
        assert_eq!(result.loaded_from, LoadedFrom::Default);
        assert!(matches!(result.error, Some(EvaluationError::ConfigNotFound)));
    }

    #[tokio::test]
    async fn reconfigure_keeps_cache() {
        let (client, calls) = client([Ok(EvaluateResponse::new([text("r1", "server")]))]);
        client.configure(config());
        client.get_remote_config_async("r1", "client").await.unwrap();

        client.configure(config().host("https://other/"));
        assert_eq!(client.get_remote_config("r1", "client").loaded_from, LoadedFrom::MemoryCache);

        client.get_remote_config_async("r2", "client").await.unwrap();
        assert_eq!(
            calls.lock().unwrap()[1].0,
            "https://other/api/client/projects/project/remoteConfigs/evaluate"
        );
    }
}
