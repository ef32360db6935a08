//! Form encoding of request descriptors.
//!
//! A [`FormBody`] collects the fields of one marketplace call. Required fields are
//! pushed unconditionally, optional fields only when they hold a value, so an
//! unset field never reaches the wire. The encoded output serves both as a POST
//! body and as a GET query string.

use crate::config::Credentials;
use secrecy::ExposeSecret;
use std::fmt::Display;
use url::form_urlencoded;

/// Content type sent with encoded bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Field carrying the API key on authenticated calls.
pub const API_KEY_FIELD: &str = "api_key";

/// Field carrying the API token on authenticated calls.
pub const API_TOKEN_FIELD: &str = "api_token";

/// Ordered collection of form fields for a single request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormBody {
    pairs: Vec<(&'static str, String)>,
}

impl FormBody {
    /// Create a new, empty body.
    #[must_use]
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Append a required field.
    pub fn push<T>(&mut self, key: &'static str, value: T)
    where
        T: Display,
    {
        self.pairs.push((key, value.to_string()));
    }

    /// Append a field only when the value is present.
    pub fn push_opt<T>(&mut self, key: &'static str, value: Option<T>)
    where
        T: Display,
    {
        if let Some(value) = value {
            self.pairs.push((key, value.to_string()));
        }
    }

    /// Append a list field as a plain `a, b, c` string.
    pub fn push_list<I>(&mut self, key: &'static str, values: I)
    where
        I: IntoIterator,
        I::Item: Display,
    {
        self.pairs.push((key, join(values)));
    }

    /// Append a port set in the backend's array-literal form, `{80, 443}`.
    pub fn push_port_set<I>(&mut self, key: &'static str, ports: I)
    where
        I: IntoIterator,
        I::Item: Display,
    {
        self.pairs.push((key, format!("{{{}}}", join(ports))));
    }

    /// Look up the textual value of a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pairs.iter().map(|(name, _)| *name)
    }

    /// Returns true if no fields have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Encode the caller-supplied fields.
    #[must_use]
    pub fn encode(&self) -> String {
        encode_pairs(self.borrowed())
    }

    /// Encode the caller-supplied fields followed by the API key and token.
    #[must_use]
    pub fn encode_authenticated(&self, credentials: &Credentials) -> String {
        let auth = [
            (API_KEY_FIELD, credentials.api_key()),
            (API_TOKEN_FIELD, credentials.api_token().expose_secret()),
        ];
        encode_pairs(self.borrowed().chain(auth))
    }

    fn borrowed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(name, value)| (*name, value.as_str()))
    }
}

/// Decode an encoded body back into its fields.
#[must_use]
pub fn decode(encoded: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(encoded.as_bytes())
        .into_owned()
        .collect()
}

// The backend reads `+` literally in some fields, so spaces must go out as
// `%20`. Literal plus signs are already `%2B` by now; the rewrite runs once,
// on the finished string.
fn encode_pairs<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish().replace('+', "%20")
}

fn join<I>(values: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    values
        .into_iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
