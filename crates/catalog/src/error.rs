use common::ErrorKind;
use thiserror::Error;

/// Failures talking to the product catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("catalog responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("catalog response could not be decoded: {0}")]
    Decode(String),

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::UpstreamUnavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_is_upstream() {
        let errors = [
            CatalogError::Status {
                status: 500,
                body: "boom".into(),
            },
            CatalogError::Decode("missing field `price`".into()),
            CatalogError::Unavailable("down".into()),
        ];

        for error in errors {
            assert_eq!(error.kind(), ErrorKind::UpstreamUnavailable);
        }
    }

    #[test]
    fn status_message_includes_body() {
        let error = CatalogError::Status {
            status: 503,
            body: "maintenance".into(),
        };
        assert_eq!(
            error.to_string(),
            "catalog responded with status 503: maintenance"
        );
    }
}
