use std::collections::HashMap;
use std::ops::Deref;

use base64::prelude::*;
use pkcs8::der::pem::PemLabel;
use pkcs8::{PrivateKeyInfo, SecretDocument};
use ring::{rand, signature};
use time::{Duration, OffsetDateTime};
use url::{ParseError, Url};

use crate::sign::SignedURLError::InvalidOption;

/// Name of the query parameter carrying the signing principal.
pub const PARAM_GOOGLE_ACCESS_ID: &str = "GoogleAccessId";
/// Name of the query parameter carrying the expiration epoch seconds.
pub const PARAM_EXPIRES: &str = "Expires";
/// Name of the query parameter carrying the base64 encoded signature.
pub const PARAM_SIGNATURE: &str = "Signature";

pub enum SignedURLMethod {
    DELETE,
    GET,
    HEAD,
    POST,
    PUT,
}

impl SignedURLMethod {
    pub fn as_str(&self) -> &str {
        match self {
            SignedURLMethod::DELETE => "DELETE",
            SignedURLMethod::GET => "GET",
            SignedURLMethod::HEAD => "HEAD",
            SignedURLMethod::POST => "POST",
            SignedURLMethod::PUT => "PUT",
        }
    }
}

/// SignedURLOptions allows you to restrict the access to the signed URL.
pub struct SignedURLOptions {
    /// Method is the HTTP method to be used with the signed URL.
    /// Signed URLs can be used with GET, HEAD, PUT, and DELETE requests.
    /// Required.
    pub method: SignedURLMethod,

    /// ContentType is the content type header the client must provide
    /// to use the generated signed URL.
    /// Optional.
    pub content_type: Option<String>,

    /// MD5 is the base64 encoded MD5 checksum of the file.
    /// If provided, the client should provide the exact value on the request
    /// header in order to use the signed URL.
    /// Optional.
    pub md5: Option<String>,
}

impl Default for SignedURLOptions {
    fn default() -> Self {
        Self {
            method: SignedURLMethod::GET,
            content_type: None,
            md5: None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SignedURLError {
    #[error("invalid option {0}")]
    InvalidOption(&'static str),
    #[error(transparent)]
    ParseError(#[from] ParseError),
    #[error("cert error by: {0}")]
    CertError(String),
}

pub(crate) struct RsaKeyPair(signature::RsaKeyPair);

impl Deref for RsaKeyPair {
    type Target = signature::RsaKeyPair;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<&[u8]> for RsaKeyPair {
    type Error = SignedURLError;

    fn try_from(private_key: &[u8]) -> Result<Self, Self::Error> {
        let pem = String::from_utf8_lossy(private_key);
        let (label, doc) = SecretDocument::from_pem(&pem).map_err(|e| SignedURLError::CertError(e.to_string()))?;
        PrivateKeyInfo::validate_pem_label(label).map_err(|e| SignedURLError::CertError(e.to_string()))?;
        let key_pair = signature::RsaKeyPair::from_pkcs8(doc.as_bytes())
            .map_err(|e| SignedURLError::CertError(e.to_string()))?;
        Ok(Self(key_pair))
    }
}

/// A URL with its query string authentication parameters.
///
/// Callers attach `query_parameters` to an HTTP request against `base_url`
/// with the verb the URL was signed for, optionally including `Content-Type`
/// and `Content-MD5` headers matching the values used when signing.
pub struct SignedURL {
    pub base_url: String,
    pub query_parameters: HashMap<String, String>,
}

impl SignedURL {
    /// Renders the complete percent-encoded URL.
    pub fn full_url(&self) -> Result<Url, SignedURLError> {
        let mut url = Url::parse(&self.base_url)?;
        {
            let mut query = url.query_pairs_mut();
            for key in [PARAM_GOOGLE_ACCESS_ID, PARAM_EXPIRES, PARAM_SIGNATURE] {
                if let Some(value) = self.query_parameters.get(key) {
                    query.append_pair(key, value);
                }
            }
        }
        Ok(url)
    }
}

/// UrlSigner creates signed URLs for Google Cloud Storage objects with the
/// query string authentication scheme.
///
/// The signer is read-only once constructed and can be shared between
/// threads. Every URL produced by one signer carries the same expiration,
/// fixed when the signer is created.
pub struct UrlSigner {
    endpoint: String,
    key_pair: RsaKeyPair,
    google_access_id: String,
    expiration: i64,
}

impl UrlSigner {
    /// Creates a signer from a PEM encoded service account private key.
    ///
    /// `google_access_id` is the authorizer of the signed URL generation,
    /// typically the service account client email address in the form of
    /// "xxx@developer.gserviceaccount.com".
    ///
    /// `expires_at` is the instant at which every URL produced by this
    /// signer stops being accepted. It defaults to 24 hours from now.
    pub fn new(
        endpoint: &str,
        private_key: &[u8],
        google_access_id: impl Into<String>,
        expires_at: Option<OffsetDateTime>,
    ) -> Result<Self, SignedURLError> {
        let google_access_id = google_access_id.into();
        if google_access_id.is_empty() {
            return Err(InvalidOption("missing required GoogleAccessID"));
        }
        let key_pair = RsaKeyPair::try_from(private_key)?;
        let expiration = expires_at
            .unwrap_or_else(|| OffsetDateTime::now_utc() + Duration::hours(24))
            .unix_timestamp();
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key_pair,
            google_access_id,
            expiration,
        })
    }

    /// Signs the request described by `path` and `opts` and returns the URL
    /// granting access to it.
    ///
    /// `path` is the full resource path of the object inside its bucket,
    /// "/bucket/object". The operation performs no I/O and does not mutate
    /// the signer.
    pub fn sign(&self, path: &str, opts: &SignedURLOptions) -> Result<SignedURL, SignedURLError> {
        validate_options(path, opts)?;

        let buffer = signature_string(
            opts.method.as_str(),
            opts.md5.as_deref().unwrap_or(""),
            opts.content_type.as_deref().unwrap_or(""),
            self.expiration,
            path,
        );
        tracing::trace!("signature_string={:?}", buffer);

        let mut signed = vec![0; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(
                &signature::RSA_PKCS1_SHA256,
                &rand::SystemRandom::new(),
                buffer.as_bytes(),
                &mut signed,
            )
            .map_err(|e| SignedURLError::CertError(e.to_string()))?;

        let mut query_parameters = HashMap::with_capacity(3);
        query_parameters.insert(PARAM_GOOGLE_ACCESS_ID.to_string(), self.google_access_id.clone());
        query_parameters.insert(PARAM_EXPIRES.to_string(), self.expiration.to_string());
        query_parameters.insert(PARAM_SIGNATURE.to_string(), BASE64_STANDARD.encode(&signed));

        Ok(SignedURL {
            base_url: format!("{}{}", self.endpoint, path),
            query_parameters,
        })
    }
}

/// Builds the string to sign as mandated by the query string authentication
/// protocol: five newline separated fields in fixed order, no trailing
/// newline.
pub(crate) fn signature_string(
    verb: &str,
    content_md5: &str,
    content_type: &str,
    expiration: i64,
    resource: &str,
) -> String {
    format!("{verb}\n{content_md5}\n{content_type}\n{expiration}\n{resource}")
}

fn validate_options(path: &str, opts: &SignedURLOptions) -> Result<(), SignedURLError> {
    if !path.starts_with('/') {
        return Err(InvalidOption("resource path must be of the form '/bucket/object'"));
    }
    if let Some(md5) = &opts.md5 {
        match BASE64_STANDARD.decode(md5) {
            Ok(v) => {
                if v.len() != 16 {
                    return Err(InvalidOption("invalid MD5 checksum length"));
                }
            }
            Err(_e) => return Err(InvalidOption("invalid MD5 checksum")),
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use base64::prelude::*;
    use ring::signature;
    use ring::signature::KeyPair;
    use time::macros::datetime;
    use time::OffsetDateTime;

    use crate::sign::{signature_string, SignedURLError, SignedURLMethod, SignedURLOptions, UrlSigner};

    const TEST_PRIVATE_KEY: &str = include_str!("../testdata/test_key.pem");
    const TEST_ENDPOINT: &str = "https://storage.googleapis.com";
    const TEST_ACCESS_ID: &str = "svc@example.iam";

    #[ctor::ctor]
    fn init() {
        let _ = tracing_subscriber::fmt::try_init();
    }

    // epoch 1700000000
    fn expiration() -> OffsetDateTime {
        datetime!(2023-11-14 22:13:20 UTC)
    }

    fn signer() -> UrlSigner {
        UrlSigner::new(
            TEST_ENDPOINT,
            TEST_PRIVATE_KEY.as_bytes(),
            TEST_ACCESS_ID,
            Some(expiration()),
        )
        .unwrap()
    }

    #[test]
    fn signature_string_has_five_fields_in_fixed_order() {
        let buffer = signature_string("GET", "", "", 1700000000, "/bucket1/obj1");
        assert_eq!(buffer, "GET\n\n\n1700000000\n/bucket1/obj1");

        let buffer = signature_string(
            "PUT",
            "iB94gawbwUSiZy5FuruIOQ==",
            "text/plain",
            1700000000,
            "/bucket1/obj1",
        );
        let fields: Vec<&str> = buffer.split('\n').collect();
        assert_eq!(
            fields,
            vec!["PUT", "iB94gawbwUSiZy5FuruIOQ==", "text/plain", "1700000000", "/bucket1/obj1"]
        );
    }

    #[test]
    fn sign_returns_fixed_parameters() {
        let signed = signer().sign("/bucket1/obj1", &SignedURLOptions::default()).unwrap();
        assert_eq!(signed.base_url, "https://storage.googleapis.com/bucket1/obj1");
        assert_eq!(signed.query_parameters["GoogleAccessId"], TEST_ACCESS_ID);
        assert_eq!(signed.query_parameters["Expires"], "1700000000");
        assert!(!signed.query_parameters["Signature"].is_empty());
    }

    #[test]
    fn sign_is_deterministic() {
        let signer = signer();
        let first = signer.sign("/bucket1/obj1", &SignedURLOptions::default()).unwrap();
        let second = signer.sign("/bucket1/obj1", &SignedURLOptions::default()).unwrap();
        assert_eq!(first.base_url, second.base_url);
        assert_eq!(first.query_parameters, second.query_parameters);
    }

    #[test]
    fn signature_verifies_against_public_key() {
        let signer = signer();
        let signed = signer.sign("/bucket1/obj1", &SignedURLOptions::default()).unwrap();
        let signature = BASE64_STANDARD.decode(&signed.query_parameters["Signature"]).unwrap();

        let buffer = signature_string("GET", "", "", 1700000000, "/bucket1/obj1");
        let public_key = signature::UnparsedPublicKey::new(
            &signature::RSA_PKCS1_2048_8192_SHA256,
            signer.key_pair.public_key().as_ref(),
        );
        public_key.verify(buffer.as_bytes(), &signature).unwrap();
    }

    #[test]
    fn signature_changes_with_every_input() {
        let signer = signer();
        let baseline = signer.sign("/bucket1/obj1", &SignedURLOptions::default()).unwrap();

        let by_method = signer
            .sign(
                "/bucket1/obj1",
                &SignedURLOptions {
                    method: SignedURLMethod::PUT,
                    ..Default::default()
                },
            )
            .unwrap();
        let by_path = signer.sign("/bucket1/obj2", &SignedURLOptions::default()).unwrap();
        let by_content_type = signer
            .sign(
                "/bucket1/obj1",
                &SignedURLOptions {
                    content_type: Some("text/plain".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        let by_md5 = signer
            .sign(
                "/bucket1/obj1",
                &SignedURLOptions {
                    md5: Some(BASE64_STANDARD.encode([0u8; 16])),
                    ..Default::default()
                },
            )
            .unwrap();
        let by_expiration = UrlSigner::new(
            TEST_ENDPOINT,
            TEST_PRIVATE_KEY.as_bytes(),
            TEST_ACCESS_ID,
            Some(expiration() + time::Duration::hours(1)),
        )
        .unwrap()
        .sign("/bucket1/obj1", &SignedURLOptions::default())
        .unwrap();

        for other in [by_method, by_path, by_content_type, by_md5, by_expiration] {
            assert_ne!(
                baseline.query_parameters["Signature"],
                other.query_parameters["Signature"]
            );
        }
    }

    #[test]
    fn expires_always_matches_the_signer() {
        let signer = signer();
        for (path, opts) in [
            ("/bucket1/obj1", SignedURLOptions::default()),
            (
                "/bucket2/obj2",
                SignedURLOptions {
                    method: SignedURLMethod::PUT,
                    content_type: Some("application/octet-stream".to_string()),
                    ..Default::default()
                },
            ),
        ] {
            let signed = signer.sign(path, &opts).unwrap();
            assert_eq!(signed.query_parameters["Expires"], "1700000000");
        }
    }

    #[test]
    fn default_expiration_is_24_hours_from_now() {
        let signer = UrlSigner::new(TEST_ENDPOINT, TEST_PRIVATE_KEY.as_bytes(), TEST_ACCESS_ID, None).unwrap();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        assert!(signer.expiration > now + 23 * 3600);
        assert!(signer.expiration <= now + 25 * 3600);
    }

    #[test]
    fn full_url_carries_the_three_parameters() {
        let signed = signer().sign("/bucket1/obj1", &SignedURLOptions::default()).unwrap();
        let url = signed.full_url().unwrap().to_string();
        assert!(url.starts_with("https://storage.googleapis.com/bucket1/obj1?"));
        assert!(url.contains("GoogleAccessId=svc%40example.iam"));
        assert!(url.contains("Expires=1700000000"));
        assert!(url.contains("Signature="));
    }

    #[test]
    fn rejects_malformed_private_key() {
        let result = UrlSigner::new(TEST_ENDPOINT, b"not a pem", TEST_ACCESS_ID, None);
        assert!(matches!(result, Err(SignedURLError::CertError(_))));
    }

    #[test]
    fn rejects_missing_access_id() {
        let result = UrlSigner::new(TEST_ENDPOINT, TEST_PRIVATE_KEY.as_bytes(), "", None);
        assert!(matches!(result, Err(SignedURLError::InvalidOption(_))));
    }

    #[test]
    fn rejects_path_without_leading_slash() {
        let result = signer().sign("bucket1/obj1", &SignedURLOptions::default());
        assert!(matches!(result, Err(SignedURLError::InvalidOption(_))));
    }

    #[test]
    fn rejects_invalid_md5_option() {
        let signer = signer();
        let wrong_length = BASE64_STANDARD.encode([0u8; 8]);
        for md5 in ["!!not base64!!", wrong_length.as_str()] {
            let result = signer.sign(
                "/bucket1/obj1",
                &SignedURLOptions {
                    md5: Some(md5.to_string()),
                    ..Default::default()
                },
            );
            assert!(matches!(result, Err(SignedURLError::InvalidOption(_))));
        }
    }
}
