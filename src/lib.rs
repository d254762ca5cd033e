//! # gcloud-url-signer
//!
//! Google Cloud Platform storage signed URL generation library.
//!
//! * [About signed URLs](https://cloud.google.com/storage/docs/access-control/signed-urls)
//! * [Query string authentication](https://cloud.google.com/storage/docs/access-control/signed-urls-v2)
//!
//! ## Quick Start
//!
//! ### Key material
//!
//! Signing requires a service account key. `ServiceAccountKey::new()` will
//! try and read it from the environment variable
//! `GOOGLE_APPLICATION_CREDENTIALS_JSON` or from the file specified in
//! `GOOGLE_APPLICATION_CREDENTIALS`.
//!
//! ```
//! use gcloud_url_signer::client::{Client, ClientConfig};
//! use gcloud_url_signer::credentials::ServiceAccountKey;
//!
//! async fn run() {
//!     let key = ServiceAccountKey::new().await.unwrap();
//!     let config = ClientConfig::default().with_key_file(&key).unwrap();
//!     let client = Client::new(config).unwrap();
//! }
//! ```
//!
//! ### Usage
//!
//! ```
//! use gcloud_url_signer::client::{Client, ClientConfig};
//! use gcloud_url_signer::http::Error;
//! use gcloud_url_signer::sign::{SignedURLMethod, SignedURLOptions};
//!
//! async fn run(client: Client) -> Result<(), Error> {
//!     // Create a signed url and hand it to a collaborator.
//!     let url_for_upload = client.signed_url("/bucket/file.txt", &SignedURLOptions {
//!         method: SignedURLMethod::PUT,
//!         content_type: Some("text/plain".to_string()),
//!         ..Default::default()
//!     })?;
//!     println!("{}", url_for_upload.full_url()?);
//!
//!     // Or execute the signed request directly.
//!     client.upload_object("/bucket/file.txt", "hello world".into(), "text/plain", None).await?;
//!     let data = client.download_object("/bucket/file.txt").await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The signer itself performs no network access: `signed_url` is a pure,
//! deterministic function of the client configuration and its arguments.

pub mod client;
pub mod credentials;
pub mod http;
pub mod sign;
