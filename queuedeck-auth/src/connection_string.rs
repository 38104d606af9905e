//! Azure Storage connection string parsing

use std::collections::HashMap;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

/// Account name used by the local storage emulator (Azurite)
pub const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";

/// Well-known account key of the local storage emulator
pub const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Queue endpoint of the local storage emulator
pub const DEV_QUEUE_ENDPOINT: &str = "http://127.0.0.1:10001/devstoreaccount1";

const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionStringError {
    #[error("Connection string is empty")]
    Empty,

    #[error("Malformed connection string segment: {0}")]
    MalformedSegment(String),

    #[error("Connection string has no AccountName")]
    MissingAccountName,

    #[error("Connection string has neither AccountKey nor SharedAccessSignature")]
    MissingCredential,

    #[error("Invalid queue endpoint: {0}")]
    InvalidEndpoint(String),
}

/// How requests to the account are authorized
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Base64 account key used for Shared Key signing
    SharedKey(String),
    /// Shared access signature token, without the leading `?`
    Sas(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SharedKey(_) => f.write_str("SharedKey(<redacted>)"),
            Self::Sas(_) => f.write_str("Sas(<redacted>)"),
        }
    }
}

/// Parsed storage account connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: String,
    pub queue_endpoint: Url,
    pub credential: Credential,
}

impl ConnectionString {
    /// Connection settings for the local storage emulator
    pub fn development() -> Self {
        Self {
            account_name: DEV_ACCOUNT_NAME.to_string(),
            // Constant is a valid URL
            queue_endpoint: Url::parse(DEV_QUEUE_ENDPOINT).expect("valid emulator endpoint"),
            credential: Credential::SharedKey(DEV_ACCOUNT_KEY.to_string()),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ConnectionStringError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ConnectionStringError::Empty);
        }

        let mut settings: HashMap<String, String> = HashMap::new();
        for segment in input.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| ConnectionStringError::MalformedSegment(segment.to_string()))?;
            settings.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        if settings
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Ok(Self::development());
        }

        let credential = if let Some(key) = settings.get("accountkey") {
            Credential::SharedKey(key.clone())
        } else if let Some(sas) = settings.get("sharedaccesssignature") {
            Credential::Sas(sas.trim_start_matches('?').to_string())
        } else {
            return Err(ConnectionStringError::MissingCredential);
        };

        let explicit_endpoint = settings
            .get("queueendpoint")
            .map(|endpoint| {
                Url::parse(endpoint)
                    .map_err(|e| ConnectionStringError::InvalidEndpoint(format!("{endpoint}: {e}")))
            })
            .transpose()?;

        let account_name = match settings.get("accountname") {
            Some(name) => name.clone(),
            None => explicit_endpoint
                .as_ref()
                .and_then(account_from_host)
                .ok_or(ConnectionStringError::MissingAccountName)?,
        };

        let queue_endpoint = match explicit_endpoint {
            Some(endpoint) => endpoint,
            None => {
                let protocol = settings
                    .get("defaultendpointsprotocol")
                    .map_or(DEFAULT_PROTOCOL, String::as_str);
                let suffix = settings
                    .get("endpointsuffix")
                    .map_or(DEFAULT_ENDPOINT_SUFFIX, String::as_str);
                let endpoint = format!("{protocol}://{account_name}.queue.{suffix}");
                Url::parse(&endpoint)
                    .map_err(|e| ConnectionStringError::InvalidEndpoint(format!("{endpoint}: {e}")))?
            }
        };

        Ok(Self {
            account_name,
            queue_endpoint,
            credential,
        })
    }
}

impl FromStr for ConnectionString {
    type Err = ConnectionStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// `myaccount.queue.core.windows.net` -> `myaccount`
fn account_from_host(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let (account, rest) = host.split_once('.')?;
    rest.starts_with("queue.").then(|| account.to_string())
}
