use bytes::Bytes;
use time::OffsetDateTime;

use crate::credentials::{self, ServiceAccountKey};
use crate::http::{check_response_status, Error};
use crate::sign::{SignedURL, SignedURLError, SignedURLMethod, SignedURLOptions, UrlSigner};

pub struct ClientConfig {
    pub http: Option<reqwest::Client>,
    /// Endpoint of the storage HTTP API. Signed URLs are issued against it.
    pub storage_endpoint: String,
    pub google_access_id: Option<String>,
    pub private_key: Option<Vec<u8>>,
    /// Expiration shared by every URL the client signs. Defaults to 24
    /// hours from client creation.
    pub expires_at: Option<OffsetDateTime>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http: None,
            storage_endpoint: "https://storage.googleapis.com".to_string(),
            google_access_id: None,
            private_key: None,
            expires_at: None,
        }
    }
}

impl ClientConfig {
    /// Takes the signing principal and key material from a service account
    /// key file.
    pub fn with_key_file(mut self, key: &ServiceAccountKey) -> Result<Self, credentials::Error> {
        let private_key = key.private_key.as_ref().ok_or(credentials::Error::NoPrivateKeyFound)?;
        self.private_key = Some(private_key.clone().into_bytes());
        self.google_access_id = key.client_email.clone();
        Ok(self)
    }
}

/// Client issues signed URLs and executes signed requests against the
/// storage HTTP API.
///
/// Once a URL is signed no further authorization is attached to the
/// request; the query parameters carry everything the service needs.
pub struct Client {
    http: reqwest::Client,
    signer: UrlSigner,
}

impl Client {
    /// New client.
    ///
    /// Fails when the key material is missing or does not parse, before any
    /// request is signed.
    pub fn new(config: ClientConfig) -> Result<Self, SignedURLError> {
        let private_key = config
            .private_key
            .as_deref()
            .ok_or(SignedURLError::InvalidOption("No private key is found"))?;
        let google_access_id = config
            .google_access_id
            .ok_or(SignedURLError::InvalidOption("No google_access_id is found"))?;
        let signer = UrlSigner::new(&config.storage_endpoint, private_key, google_access_id, config.expires_at)?;
        Ok(Self {
            http: config.http.unwrap_or_default(),
            signer,
        })
    }

    /// Get signed url.
    /// Signed URLs allow anyone access to a restricted resource for a
    /// limited time without needing a Google account or signing in.
    /// https://cloud.google.com/storage/docs/access-control/signed-urls
    ///
    /// ```
    /// use gcloud_url_signer::client::Client;
    /// use gcloud_url_signer::sign::{SignedURLOptions, SignedURLMethod};
    ///
    /// fn run(client: Client) {
    ///     let url_for_download = client.signed_url("/bucket/file.txt", &SignedURLOptions::default());
    ///     let url_for_upload = client.signed_url("/bucket/file.txt", &SignedURLOptions {
    ///         method: SignedURLMethod::PUT,
    ///         ..Default::default()
    ///     });
    /// }
    /// ```
    pub fn signed_url(&self, path: &str, opts: &SignedURLOptions) -> Result<SignedURL, SignedURLError> {
        self.signer.sign(path, opts)
    }

    /// Uploads the object with a signed PUT request.
    ///
    /// `md5` is the base64 encoded MD5 checksum of `data`; when provided it
    /// is bound into the signature and sent as the `Content-MD5` header.
    pub async fn upload_object(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
        md5: Option<String>,
    ) -> Result<(), Error> {
        let opts = SignedURLOptions {
            method: SignedURLMethod::PUT,
            content_type: Some(content_type.to_string()),
            md5: md5.clone(),
        };
        let url = self.signer.sign(path, &opts)?.full_url()?;

        let mut builder = self
            .http
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CONTENT_LENGTH, data.len())
            .body(data);
        if let Some(md5) = md5 {
            builder = builder.header("Content-MD5", md5);
        }
        check_response_status(builder.send().await?).await?;
        Ok(())
    }

    /// Downloads the object with a signed GET request.
    pub async fn download_object(&self, path: &str) -> Result<Bytes, Error> {
        let url = self.signer.sign(path, &SignedURLOptions::default())?.full_url()?;
        let response = check_response_status(self.http.get(url).send().await?).await?;
        Ok(response.bytes().await?)
    }
}
