//! Errors returned by [`ConnectionService`](crate::ConnectionService).

use thiserror::Error;

use crate::cipher::CipherError;
use crate::provider::{ProviderError, UnsupportedQuery};
use crate::registry::RegistryError;
use crate::store::StoreError;
use crate::types::{ConnectionId, ProviderId, UserId, ValidationError};

/// Service errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed key, or a token that fails authentication.
    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// The provider rejected the token offered to `connect`.
    #[error("Invalid API token")]
    InvalidToken,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The user has no stored connection for the provider.
    #[error("no {provider} connection for user {user_id}")]
    NotConnected {
        user_id: UserId,
        provider: ProviderId,
    },

    /// The connection does not exist or belongs to someone else.
    #[error("connection not found: {connection_id}")]
    ConnectionNotFound { connection_id: ConnectionId },

    /// The query asks for something the provider does not declare.
    #[error("{provider} does not support {reason}")]
    Unsupported {
        provider: ProviderId,
        reason: UnsupportedQuery,
    },

    /// The query fails checks that hold for every provider.
    #[error("invalid query: {0}")]
    InvalidQuery(#[source] ValidationError),

    /// Upstream failure, passed through unchanged.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Whether retrying or re-prompting the user cannot help.
    ///
    /// Configuration problems, unknown providers and undecryptable tokens
    /// need an operator, not the end user.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Cipher(_) | Self::Registry(_))
    }

    /// Whether the caller should prompt the user to (re)connect.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotConnected { .. } | Self::ConnectionNotFound { .. }
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
