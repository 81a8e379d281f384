use serde::Serialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("a url is required")]
    MissingUrl,
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported url scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),
    #[error("a currency pair is required")]
    MissingCurrencyPair,
}

/// Validated parameters of a start call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartRequest {
    url: String,
    currency_pair: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_sheet_id: Option<String>,
}

impl StartRequest {
    pub fn new(
        url: &str,
        currency_pair: &str,
        target_sheet_id: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ValidationError::MissingUrl);
        }
        let parsed = Url::parse(url).map_err(|err| ValidationError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationError::UnsupportedScheme(
                parsed.scheme().to_string(),
            ));
        }

        let currency_pair = currency_pair.trim();
        if currency_pair.is_empty() {
            return Err(ValidationError::MissingCurrencyPair);
        }

        let target_sheet_id = target_sheet_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ToOwned::to_owned);

        Ok(Self {
            // Keep the caller's spelling; `Url` would append a trailing slash.
            url: url.to_string(),
            currency_pair: currency_pair.to_string(),
            target_sheet_id,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn currency_pair(&self) -> &str {
        &self.currency_pair
    }

    pub fn target_sheet_id(&self) -> Option<&str> {
        self.target_sheet_id.as_deref()
    }
}
