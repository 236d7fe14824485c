use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request to {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request to {path} returned status {status}.")]
    Status { path: String, status: u16 },
    #[error("Response from {path} could not be decoded: {source}")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Controller rejected the request to {path}.")]
    NotOk { path: String },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
