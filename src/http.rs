use reqwest::Response;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A non-2xx response returned when a signed URL is used, with the
    /// status code and the response body.
    #[error("Request failed: status={0} detail={1}")]
    Response(u16, String),

    /// An error from the underlying HTTP client.
    #[error(transparent)]
    HttpClient(#[from] reqwest::Error),

    /// The request could not be signed.
    #[error(transparent)]
    Sign(#[from] crate::sign::SignedURLError),
}

/// Checks whether an HTTP response is successful and returns it, or drains
/// the body into an error.
pub(crate) async fn check_response_status(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::Response(status.as_u16(), response.text().await?))
    }
}
