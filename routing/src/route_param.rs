//! URL-safe encoding of route state.

use std::fmt::Display;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A route serialized as CBOR and wrapped in URL-safe base64, suitable for a
/// query string or hash segment.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RouteParam<T>(pub T);

impl<T> From<T> for RouteParam<T> {
    fn from(value: T) -> Self {
        RouteParam(value)
    }
}

impl<T> RouteParam<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

#[derive(Debug)]
pub enum RouteParamError {
    Decode(base64::DecodeError),
    Deserialize(ciborium::de::Error<std::io::Error>),
    Serialize(String),
}

impl Display for RouteParamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(err) => write!(f, "Failed to decode base64: {}", err),
            Self::Deserialize(err) => write!(f, "Failed to deserialize route: {}", err),
            Self::Serialize(err) => write!(f, "Failed to serialize route: {}", err),
        }
    }
}

impl std::error::Error for RouteParamError {}

impl<T: Serialize> RouteParam<T> {
    pub fn encode(&self) -> Result<String, RouteParamError> {
        let mut serialized = Vec::new();
        ciborium::into_writer(&self.0, &mut serialized).map_err(|err| RouteParamError::Serialize(err.to_string()))?;
        Ok(URL_SAFE.encode(serialized))
    }
}

// Display output parses back through FromStr
impl<T: Serialize> Display for RouteParam<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let encoded = self.encode().map_err(|_| std::fmt::Error)?;
        f.write_str(&encoded)
    }
}

impl<T: DeserializeOwned> FromStr for RouteParam<T> {
    type Err = RouteParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = URL_SAFE.decode(s.as_bytes()).map_err(RouteParamError::Decode)?;
        let parsed = ciborium::from_reader(std::io::Cursor::new(decoded)).map_err(RouteParamError::Deserialize)?;
        Ok(RouteParam(parsed))
    }
}
