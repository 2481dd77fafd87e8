//! Conversions from external infrastructure errors into domain errors.

use keyring::Error as KeyringError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use tether_domain::{TetherError, TransportFailure};

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub TetherError);

impl From<InfraError> for TetherError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<TetherError> for InfraError {
    fn from(value: TetherError) -> Self {
        Self(value)
    }
}

trait IntoTetherError {
    fn into_tether(self) -> TetherError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → TetherError */
/* -------------------------------------------------------------------------- */

impl IntoTetherError for SqlError {
    fn into_tether(self) -> TetherError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => TetherError::Storage("database is busy".into()),
                    ErrorCode::DatabaseLocked => TetherError::Storage("database is locked".into()),
                    ErrorCode::DiskFull => TetherError::Storage("disk is full".into()),
                    ErrorCode::CannotOpen => {
                        TetherError::Storage(format!("unable to open database: {message}"))
                    }
                    _ => TetherError::Storage(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                TetherError::Storage(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                TetherError::Storage(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => TetherError::Storage(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => TetherError::Storage(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        Self(value.into_tether())
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        Self(TetherError::Storage(format!("connection pool error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → TetherError */
/* -------------------------------------------------------------------------- */

impl IntoTetherError for KeyringError {
    fn into_tether(self) -> TetherError {
        match self {
            KeyringError::NoEntry => TetherError::Keychain("keychain entry not found".into()),
            KeyringError::BadEncoding(_) => {
                TetherError::Keychain("credential in keychain is not valid UTF-8".into())
            }
            KeyringError::TooLong(name, limit) => TetherError::Keychain(format!(
                "keychain attribute '{name}' exceeds platform limit ({limit})"
            )),
            KeyringError::PlatformFailure(err) => {
                TetherError::Keychain(format!("keychain platform error: {err}"))
            }
            KeyringError::NoStorageAccess(err) => {
                TetherError::Keychain(format!("unable to access secure storage: {err}"))
            }
            other => TetherError::Keychain(other.to_string()),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        Self(value.into_tether())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TetherError / TransportFailure */
/* -------------------------------------------------------------------------- */

impl IntoTetherError for HttpError {
    fn into_tether(self) -> TetherError {
        if self.is_timeout() {
            return TetherError::Network("HTTP request timed out".into());
        }
        if self.is_connect() {
            return TetherError::Network("HTTP connection failure".into());
        }
        if self.is_builder() {
            return TetherError::Config(format!("invalid HTTP client setup: {self}"));
        }
        TetherError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_tether())
    }
}

/// Map a reqwest failure onto the transport port's failure kinds
pub fn transport_failure(err: &HttpError) -> TransportFailure {
    if err.is_timeout() {
        TransportFailure::Timeout
    } else if err.is_connect() {
        TransportFailure::Unreachable(err.to_string())
    } else if err.is_request() || err.is_body() || err.is_decode() {
        TransportFailure::Aborted(err.to_string())
    } else {
        TransportFailure::Other(err.to_string())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::Client;
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_storage_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: TetherError = InfraError::from(err).into();
        match mapped {
            TetherError::Storage(msg) => assert!(msg.contains("busy")),
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    #[test]
    fn keyring_no_entry_maps_to_keychain_error() {
        let mapped: TetherError = InfraError::from(KeyringError::NoEntry).into();
        assert_eq!(mapped, TetherError::Keychain("keychain entry not found".into()));
    }

    #[tokio::test]
    async fn slow_response_maps_to_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;

        let client =
            Client::builder().no_proxy().timeout(Duration::from_millis(50)).build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap_err();

        assert_eq!(transport_failure(&error), TransportFailure::Timeout);
        let mapped: TetherError = InfraError::from(error).into();
        assert!(matches!(mapped, TetherError::Network(_)));
    }

    #[tokio::test]
    async fn refused_connection_maps_to_unreachable() {
        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get("http://127.0.0.1:9/").send().await.unwrap_err();

        assert!(matches!(transport_failure(&error), TransportFailure::Unreachable(_)));
    }
}
