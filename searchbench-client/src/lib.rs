use searchbench_common::{
    Autocompleter, BenchError, BulkRequest, Document, ErrorResponse, IndexOptions, Query, Result,
    SearchIndex, SearchResult, Suggestion,
};

/// SearchBench HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend address as `host:port`.
    pub addr: String,
    /// Name of the index (and its autocomplete dictionary) on the backend.
    pub index: String,
}

/// Backend adapter speaking the searchbench-server HTTP protocol.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpIndex {
    pub config: ClientConfig,
    http_client: reqwest::Client,
}

impl HttpIndex {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Self {
        Self { config, http_client: reqwest::Client::new() }
    }

    /// Build the URL for an index resource, e.g. `suffix = "/search"`.
    pub fn build_index_url(&self, suffix: &str) -> String {
        format!("http://{}/indexes/{}{}", self.config.addr, self.config.index, suffix)
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            return Err(parse_error_response(status, &self.config.index, response).await);
        }
        Ok(response)
    }
}

fn network_error(e: reqwest::Error) -> BenchError {
    BenchError::NetworkError(e.to_string())
}

impl SearchIndex for HttpIndex {
    async fn create(&self) -> Result<()> {
        let response = self
            .http_client
            .put(self.build_index_url(""))
            .send()
            .await
            .map_err(network_error)?;
        self.check(response).await?;
        Ok(())
    }

    async fn drop_index(&self) -> Result<()> {
        let response = self
            .http_client
            .delete(self.build_index_url(""))
            .send()
            .await
            .map_err(network_error)?;
        self.check(response).await?;
        Ok(())
    }

    async fn index(&self, documents: &[Document], options: &IndexOptions) -> Result<()> {
        let body = BulkRequest { documents: documents.to_vec(), options: *options };
        let response = self
            .http_client
            .post(self.build_index_url("/documents"))
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;
        self.check(response).await?;
        Ok(())
    }

    async fn search(&self, query: &Query) -> Result<SearchResult> {
        let response = self
            .http_client
            .post(self.build_index_url("/search"))
            .json(query)
            .send()
            .await
            .map_err(network_error)?;
        self.check(response).await?.json::<SearchResult>().await.map_err(network_error)
    }
}

impl Autocompleter for HttpIndex {
    async fn add_terms(&self, terms: &[Suggestion]) -> Result<()> {
        let response = self
            .http_client
            .post(self.build_index_url("/suggestions"))
            .json(terms)
            .send()
            .await
            .map_err(network_error)?;
        self.check(response).await?;
        Ok(())
    }

    async fn suggest(&self, prefix: &str, limit: usize, fuzzy: bool) -> Result<Vec<Suggestion>> {
        let limit = limit.to_string();
        let fuzzy = fuzzy.to_string();
        let response = self
            .http_client
            .get(self.build_index_url("/suggest"))
            .query(&[("prefix", prefix), ("limit", limit.as_str()), ("fuzzy", fuzzy.as_str())])
            .send()
            .await
            .map_err(network_error)?;
        self.check(response).await?.json::<Vec<Suggestion>>().await.map_err(network_error)
    }

    async fn delete(&self) -> Result<()> {
        let response = self
            .http_client
            .delete(self.build_index_url("/suggestions"))
            .send()
            .await
            .map_err(network_error)?;
        self.check(response).await?;
        Ok(())
    }
}

async fn parse_error_response(
    status: reqwest::StatusCode,
    index: &str,
    response: reqwest::Response,
) -> BenchError {
    if status == reqwest::StatusCode::NOT_FOUND {
        return BenchError::IndexNotFound(index.to_string());
    }

    let error_msg = response
        .json::<ErrorResponse>()
        .await
        .map(|r| r.error)
        .unwrap_or_else(|_| format!("Server returned status: {}", status));

    // 409 also covers duplicate documents; only index creation maps back to IndexExists.
    if status == reqwest::StatusCode::CONFLICT && error_msg.starts_with("Index already exists") {
        return BenchError::IndexExists(index.to_string());
    }
    BenchError::HttpError(status.as_u16(), error_msg)
}
