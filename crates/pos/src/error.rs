use boutique_core::money::MoneyError;
use boutique_core::provider::PosProvider;

/// Errors raised by POS adapters and the provider registry.
#[derive(Debug, thiserror::Error)]
pub enum PosError {
    /// The provider is unknown or has no configuration in this process.
    #[error("POS provider not registered: {0}")]
    NotRegistered(String),

    /// The provider has no equivalent of the requested operation.
    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: PosProvider,
        operation: &'static str,
    },

    /// Caller-supplied input the provider cannot work with.
    #[error("{0}")]
    InvalidInput(String),

    /// The provider answered with a non-2xx status.
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: PosProvider,
        status: u16,
        message: String,
    },

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered 2xx with a body we could not interpret.
    #[error("Unexpected {provider} response: {message}")]
    Decode {
        provider: PosProvider,
        message: String,
    },
}

impl PosError {
    pub(crate) fn decode(provider: PosProvider, message: impl Into<String>) -> Self {
        Self::Decode {
            provider,
            message: message.into(),
        }
    }

    pub(crate) fn money(provider: PosProvider, err: MoneyError) -> Self {
        Self::decode(provider, err.to_string())
    }

    /// Whether the request timed out before the provider answered.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_timeout())
    }
}
