//! Google Cloud Storage backend for [`StorageClient`].
//!
//! Listing and reads go through the GCS JSON API, so object names reach the
//! pipeline exactly as stored (trailing `/`, empty and `.` segments included).
//! Credentials come from `object_store`'s GCS credential chain.

use super::storage_client::{ByteStream, ObjectInfoStream, StorageClient, StoreError, StoreResult};
use crate::models::object::ObjectInfo;
use futures::{StreamExt, TryStreamExt, future, stream};
use object_store::{
    CredentialProvider, RetryConfig,
    gcp::{GcpCredentialProvider, GoogleCloudStorageBuilder},
};
use reqwest::RequestBuilder;
use serde::Deserialize;
use std::{env, ffi::OsString, io, path::PathBuf, sync::Arc, time::Duration};
use tracing::{debug, warn};
use url::Url;

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com/storage/v1";

/// Only the fields the downloader uses are requested from the listing.
const LIST_FIELDS: &str = "items(name,size),nextPageToken";

/// Environment variables `object_store` reads service-account credentials from.
const CREDENTIAL_ENV_VARS: [&str; 4] = [
    "GOOGLE_SERVICE_ACCOUNT",
    "GOOGLE_SERVICE_ACCOUNT_PATH",
    "GOOGLE_SERVICE_ACCOUNT_KEY",
    "GOOGLE_APPLICATION_CREDENTIALS",
];

/// Set when running against a non-default metadata server.
const METADATA_ENV_VARS: [&str; 2] = ["GCE_METADATA_HOST", "GCE_METADATA_ROOT"];

/// Addresses of the GCE metadata server. Both are tried.
const METADATA_HOSTS: [&str; 2] = ["http://169.254.169.254", "http://metadata.google.internal"];
const METADATA_FLAVOR: &str = "Metadata-Flavor";
const METADATA_TIMEOUT: Duration = Duration::from_millis(500);

const ADC_FILE_NAME: &str = "application_default_credentials.json";

/// `object_store` needs a bucket name to assemble its credential chain.
const CREDENTIALS_BUCKET: &str = "gsdownload-credentials";

#[derive(Clone)]
enum Auth {
    Bearer(GcpCredentialProvider),
    Anonymous,
}

impl Auth {
    async fn authorize(&self, request: RequestBuilder) -> StoreResult<RequestBuilder> {
        match self {
            Auth::Anonymous => Ok(request),
            Auth::Bearer(provider) => {
                let credential = provider.get_credential().await?;
                Ok(request.bearer_auth(&credential.bearer))
            }
        }
    }
}

/// One page of `objects.list`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    items: Vec<ListedObject>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    /// The JSON API encodes sizes as decimal strings.
    size: String,
}

/// GCS client speaking the JSON API over a shared `reqwest` connection pool.
pub struct GcsClient {
    http: reqwest::Client,
    endpoint: String,
    metadata_hosts: Vec<String>,
    auth: Option<Auth>,
}

impl Default for GcsClient {
    fn default() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }
}

impl GcsClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            metadata_hosts: METADATA_HOSTS.iter().map(|host| host.to_string()).collect(),
            auth: None,
        }
    }

    fn auth(&self) -> StoreResult<Auth> {
        self.auth.clone().ok_or(StoreError::NotConnected)
    }

    /// `{endpoint}/b/{bucket}/o`, with the bucket percent-encoded.
    fn objects_url(&self, bucket: &str) -> StoreResult<Url> {
        let endpoint_error = |source| StoreError::Endpoint {
            endpoint: self.endpoint.clone(),
            source,
        };
        let mut url = Url::parse(&self.endpoint).map_err(endpoint_error)?;
        url.path_segments_mut()
            .map_err(|()| endpoint_error(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["b", bucket, "o"]);
        Ok(url)
    }

    /// True when a GCE metadata server answers on any known address.
    async fn on_gce(&self) -> bool {
        let checks = self.metadata_hosts.iter().map(|host| {
            self.http
                .get(host)
                .header(METADATA_FLAVOR, "Google")
                .timeout(METADATA_TIMEOUT)
                .send()
        });
        future::join_all(checks).await.into_iter().any(|response| {
            response.is_ok_and(|response| {
                response
                    .headers()
                    .get(METADATA_FLAVOR)
                    .is_some_and(|flavor| flavor == "Google")
            })
        })
    }

    /// Resolve default credentials and fetch a token with them once.
    async fn load_credentials() -> StoreResult<GcpCredentialProvider> {
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(CREDENTIALS_BUCKET)
            .with_retry(RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            })
            .build()?;
        let provider = Arc::clone(store.credentials());
        provider.get_credential().await?;
        Ok(provider)
    }
}

impl StorageClient for GcsClient {
    async fn connect(&mut self) -> StoreResult<()> {
        let discoverable = credentials_discoverable(
            |key| env::var_os(key),
            application_default_credentials(),
        );
        let auth = if discoverable || self.on_gce().await {
            match Self::load_credentials().await {
                Ok(provider) => Auth::Bearer(provider),
                Err(err) => {
                    warn!(
                        error = %err,
                        "could not load default credentials, using anonymous access"
                    );
                    Auth::Anonymous
                }
            }
        } else {
            warn!("could not find default credentials, using anonymous access");
            Auth::Anonymous
        };
        debug!(authenticated = matches!(auth, Auth::Bearer(_)), "connected");
        self.auth = Some(auth);
        Ok(())
    }

    fn walk(&self, bucket: &str, prefix: &str) -> ObjectInfoStream {
        let (auth, url) = match self.auth().and_then(|auth| Ok((auth, self.objects_url(bucket)?))) {
            Ok(parts) => parts,
            Err(err) => return stream::once(async move { Err(err) }).boxed(),
        };
        let http = self.http.clone();
        let prefix = prefix.to_string();

        // State is the token of the next page to fetch; `None` once the
        // listing is exhausted.
        stream::try_unfold(Some(None::<String>), move |state| {
            let (http, auth, url, prefix) = (http.clone(), auth.clone(), url.clone(), prefix.clone());
            async move {
                let Some(page_token) = state else {
                    return Ok::<_, StoreError>(None);
                };
                let page = list_page(&http, &auth, url, &prefix, page_token.as_deref()).await?;
                let objects = page
                    .items
                    .into_iter()
                    .map(object_info)
                    .collect::<StoreResult<Vec<_>>>()?;
                debug!(count = objects.len(), "listed page");
                Ok(Some((objects, page.next_page_token.map(Some))))
            }
        })
        .map_ok(|objects| stream::iter(objects.into_iter().map(Ok::<_, StoreError>)))
        .try_flatten()
        .boxed()
    }

    async fn open(&self, bucket: &str, name: &str) -> StoreResult<ByteStream> {
        let auth = self.auth()?;
        let mut url = self.objects_url(bucket)?;
        url.path_segments_mut()
            .map_err(|()| StoreError::Endpoint {
                endpoint: self.endpoint.clone(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .push(name);

        let request = self.http.get(url).query(&[("alt", "media")]);
        let response = auth
            .authorize(request)
            .await?
            .send()
            .await?
            .error_for_status()?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(io::Error::other))
            .boxed())
    }

    /// Pooled connections are released when the client is dropped.
    fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

async fn list_page(
    http: &reqwest::Client,
    auth: &Auth,
    url: Url,
    prefix: &str,
    page_token: Option<&str>,
) -> StoreResult<ListPage> {
    let mut request = http.get(url).query(&[("fields", LIST_FIELDS)]);
    if !prefix.is_empty() {
        request = request.query(&[("prefix", prefix)]);
    }
    if let Some(token) = page_token {
        request = request.query(&[("pageToken", token)]);
    }
    let page = auth
        .authorize(request)
        .await?
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(page)
}

fn object_info(listed: ListedObject) -> StoreResult<ObjectInfo> {
    match listed.size.parse() {
        Ok(size) => Ok(ObjectInfo::new(listed.name, size)),
        Err(source) => Err(StoreError::InvalidSize {
            name: listed.name,
            source,
        }),
    }
}

/// True when a credential source `object_store` can load is configured,
/// either through the environment or a gcloud application-default file.
fn credentials_discoverable(
    lookup: impl Fn(&str) -> Option<OsString>,
    adc_file: Option<PathBuf>,
) -> bool {
    CREDENTIAL_ENV_VARS
        .iter()
        .chain(METADATA_ENV_VARS.iter())
        .any(|key| lookup(key).is_some_and(|value| !value.is_empty()))
        || adc_file.is_some_and(|path| path.is_file())
}

/// Location gcloud writes application-default credentials to.
fn application_default_credentials() -> Option<PathBuf> {
    #[cfg(windows)]
    let config_dir = env::var_os("APPDATA").map(PathBuf::from);
    #[cfg(not(windows))]
    let config_dir = env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"));

    config_dir.map(|dir| dir.join("gcloud").join(ADC_FILE_NAME))
}
