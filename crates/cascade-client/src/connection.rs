use cascade_core::{
    AppError, Connection, DescribeResult, QueryFilter, Record, build_query,
};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::ConnectionConfig;

/// Service-side handle for one object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SObjectHandle {
    pub name: String,
    pub describe_url: Url,
}

/// REST API connection to the remote platform.
///
/// Queries go through `queryAll` so archived and deleted rows that other
/// records still reference are visible, and every result page is drained
/// before returning.
#[derive(Clone)]
pub struct RestConnection {
    client: Client,
    instance_url: Url,
    api_version: String,
    access_token: String,
    timeout_secs: u64,
}

impl RestConnection {
    pub fn new(config: &ConnectionConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("cascade/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            instance_url: config.instance_url.clone(),
            api_version: config.api_version.clone(),
            access_token: config.access_token.clone(),
            timeout_secs: config.timeout.as_secs(),
        })
    }

    fn data_url(&self, path: &str) -> Result<Url, AppError> {
        self.resolve(&format!("/services/data/v{}/{path}", self.api_version))
    }

    fn resolve(&self, path: &str) -> Result<Url, AppError> {
        self.instance_url
            .join(path)
            .map_err(|e| AppError::HttpError(format!("Invalid URL path {path}: {e}")))
    }

    /// Send an authorized request and decode a JSON body.
    ///
    /// Non-success statuses are reported through `on_error` with the
    /// platform's own error text when the body carries one.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        on_error: fn(String) -> AppError,
    ) -> Result<T, AppError> {
        let response = request
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::HttpError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(on_error(platform_error_message(status.as_u16(), &body)));
        }

        response
            .json()
            .await
            .map_err(|e| on_error(format!("Failed to parse response: {e}")))
    }
}

// ---- Platform API types ----

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SObjectInfo {
    object_describe: ObjectDescribe,
}

#[derive(Deserialize)]
struct ObjectDescribe {
    name: String,
    #[serde(default)]
    urls: ObjectUrls,
}

#[derive(Deserialize, Default)]
struct ObjectUrls {
    describe: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage {
    done: bool,
    #[serde(default)]
    next_records_url: Option<String>,
    records: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    error_code: Option<String>,
}

/// Turn an error response body into a readable message.
fn platform_error_message(status_code: u16, body: &str) -> String {
    match serde_json::from_str::<Vec<ApiErrorDetail>>(body) {
        Ok(details) if !details.is_empty() => details
            .iter()
            .map(|d| match &d.error_code {
                Some(code) => format!("{code}: {}", d.message),
                None => d.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        _ => format!("HTTP {status_code}: {body}"),
    }
}

/// Strip the per-record `attributes` envelope and decode field values.
fn decode_records(
    raw: Vec<serde_json::Map<String, serde_json::Value>>,
) -> Result<Vec<Record>, AppError> {
    raw.into_iter()
        .map(|mut fields| {
            fields.remove("attributes");
            serde_json::from_value(serde_json::Value::Object(fields))
                .map_err(|e| AppError::QueryError(format!("Unsupported field value: {e}")))
        })
        .collect()
}

impl Connection for RestConnection {
    type Proxy = SObjectHandle;

    async fn get_proxy(&self, sobject: &str) -> Result<SObjectHandle, AppError> {
        let url = self.data_url(&format!("sobjects/{sobject}/"))?;
        let info: SObjectInfo = self
            .send_json(self.client.get(url), AppError::ConnectionError)
            .await?;

        let describe_url = match info.object_describe.urls.describe {
            Some(path) => self.resolve(&path)?,
            None => self.data_url(&format!("sobjects/{sobject}/describe/"))?,
        };

        Ok(SObjectHandle {
            name: info.object_describe.name,
            describe_url,
        })
    }

    async fn describe(&self, proxy: &SObjectHandle) -> Result<DescribeResult, AppError> {
        self.send_json(
            self.client.get(proxy.describe_url.clone()),
            AppError::DescribeError,
        )
        .await
    }

    async fn query(
        &self,
        sobject: &str,
        field_list: &str,
        filter: &QueryFilter,
    ) -> Result<Vec<Record>, AppError> {
        let soql = build_query(sobject, field_list, filter);
        tracing::debug!(%sobject, %soql, "Running query");

        let mut request = self
            .client
            .get(self.data_url("queryAll/")?)
            .query(&[("q", soql.as_str())]);
        let mut records = Vec::new();
        loop {
            let page: QueryPage = self.send_json(request, AppError::QueryError).await?;
            records.extend(decode_records(page.records)?);

            match (page.done, page.next_records_url) {
                (false, Some(next)) => request = self.client.get(self.resolve(&next)?),
                _ => break,
            }
        }

        tracing::debug!(%sobject, count = records.len(), "Query drained");
        Ok(records)
    }
}
