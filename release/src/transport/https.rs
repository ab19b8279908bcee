//! HTTP(S) upload transport.
//!
//! Channel keys: `url` (required, `http://` or `https://`), `method`,
//! `headers`, `verify` and `timeout` (seconds).

use super::{Fields, TransportError};
use crate::config::HttpDefaults;
use crate::manifest::{ChannelConfig, ManifestError};
use serde_json::Value;
use std::io;
use std::time::Duration;
use ureq::http::{HeaderName, HeaderValue, Method, Request, Uri};
use ureq::tls::TlsConfig;

const PROTOCOL: &str = "HTTPS";
const CONTENT_TYPE: &str = "Content-Type";
const OCTET_STREAM: &str = "application/octet-stream";

/// Request parameters derived from an HTTPS channel.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    /// Target URL.
    pub url: String,
    /// Upper-case request method.
    pub method: String,
    /// Request headers in name order; always includes a content type.
    pub headers: Vec<(String, String)>,
    /// Verify the server certificate.
    pub verify: bool,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl HttpSettings {
    /// Derive upload settings from a merged channel record.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::UnsupportedScheme`] for a URL that is not
    /// `http://` or `https://`, and [`ManifestError::ChannelField`] for a
    /// missing or mistyped field.
    ///
    /// # Examples
    ///
    /// ```
    /// use otaship_release::config::HttpDefaults;
    /// use otaship_release::transport::HttpSettings;
    /// use serde_json::json;
    ///
    /// let channel = json!({"url": "https://updates.example/fw.bin"});
    /// let channel = channel.as_object().expect("record");
    /// let settings = HttpSettings::from_channel(channel, &HttpDefaults::default())
    ///     .expect("valid channel");
    /// assert_eq!(settings.method, "PUT");
    /// assert!(settings.verify);
    /// ```
    pub fn from_channel(
        channel: &ChannelConfig,
        defaults: &HttpDefaults,
    ) -> Result<Self, ManifestError> {
        let fields = Fields::new(PROTOCOL, channel);
        let url = fields.required_string("url")?;
        check_url(url)?;

        let method = fields
            .string("method")?
            .unwrap_or(defaults.method.as_str())
            .trim()
            .to_ascii_uppercase();
        Method::from_bytes(method.as_bytes())
            .map_err(|_| fields.error("method", format!("'{method}' is not a valid HTTP method")))?;

        let timeout = match fields.number("timeout")? {
            Some(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs).map_err(|_| {
                fields.error("timeout", format!("{secs} seconds is out of range"))
            })?,
            Some(secs) => {
                return Err(fields.error("timeout", format!("must be a positive number, got {secs}")));
            }
            None => Duration::from_secs(defaults.timeout_secs),
        };

        Ok(Self {
            url: url.to_owned(),
            method,
            headers: headers(&fields)?,
            verify: fields.boolean("verify")?.unwrap_or(true),
            timeout,
        })
    }

    /// Return the value of header `name`, ignoring ASCII case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

fn check_url(url: &str) -> Result<(), ManifestError> {
    let uri: Uri = url.parse().map_err(|err| {
        ManifestError::channel_field(PROTOCOL, "url", format!("is not a valid URL: {err}"))
    })?;
    match uri.scheme_str() {
        Some("http" | "https") => {}
        other => {
            return Err(ManifestError::UnsupportedScheme {
                protocol: PROTOCOL,
                scheme: other.unwrap_or_default().to_owned(),
                expected: "http or https",
            });
        }
    }
    if uri.host().is_none_or(str::is_empty) {
        return Err(ManifestError::channel_field(PROTOCOL, "url", "has no host"));
    }
    Ok(())
}

fn headers(fields: &Fields<'_>) -> Result<Vec<(String, String)>, ManifestError> {
    let mut headers = match fields.get("headers") {
        None => Vec::new(),
        Some(value) => value
            .as_object()
            .ok_or_else(|| fields.error("headers", "must be a record of strings"))?
            .iter()
            .map(|(name, value)| header(fields, name, value))
            .collect::<Result<Vec<_>, _>>()?,
    };
    if !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE)) {
        headers.push((CONTENT_TYPE.to_owned(), OCTET_STREAM.to_owned()));
        headers.sort();
    }
    Ok(headers)
}

/// Header names and values must be sendable as-is.
fn header(
    fields: &Fields<'_>,
    name: &str,
    value: &Value,
) -> Result<(String, String), ManifestError> {
    let invalid = |problem: String| fields.error("headers", problem);
    let value = value
        .as_str()
        .ok_or_else(|| invalid(format!("value for '{name}' must be a string")))?;
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| invalid(format!("'{name}' is not a valid header name")))?;
    HeaderValue::from_str(value)
        .map_err(|_| invalid(format!("value for '{name}' is not a valid header value")))?;
    Ok((name.to_owned(), value.to_owned()))
}

/// Uploads an artifact payload to a URL.
#[cfg_attr(any(test, feature = "test-support"), mockall::automock)]
pub trait HttpUploader {
    /// Send `payload` according to `settings` and return the response status.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Status`] for a non-success response and
    /// [`TransportError::Http`] when the request cannot be completed.
    fn upload(&self, settings: &HttpSettings, payload: &[u8]) -> Result<u16, TransportError>;
}

/// [`HttpUploader`] backed by `ureq`.
///
/// A fresh agent is built per upload because timeout and certificate
/// verification are channel settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct UreqUploader;

impl HttpUploader for UreqUploader {
    fn upload(&self, settings: &HttpSettings, payload: &[u8]) -> Result<u16, TransportError> {
        let tls = TlsConfig::builder()
            .disable_verification(!settings.verify)
            .build();
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(settings.timeout))
            .tls_config(tls)
            .build();
        let agent = ureq::Agent::new_with_config(config);

        let mut builder = Request::builder()
            .method(settings.method.as_str())
            .uri(settings.url.as_str());
        for (name, value) in &settings.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let request = builder
            .body(payload.to_vec())
            .map_err(|err| http_error(settings, err.to_string()))?;

        let response = agent
            .run(request)
            .map_err(|err| map_ureq_error(settings, &err))?;
        let status = response.status().as_u16();
        io::copy(&mut response.into_body().as_reader(), &mut io::sink())
            .map_err(|err| http_error(settings, err.to_string()))?;
        Ok(status)
    }
}

fn http_error(settings: &HttpSettings, reason: String) -> TransportError {
    TransportError::Http {
        method: settings.method.clone(),
        url: settings.url.clone(),
        reason,
    }
}

fn map_ureq_error(settings: &HttpSettings, err: &ureq::Error) -> TransportError {
    match err {
        ureq::Error::StatusCode(status) => TransportError::Status {
            method: settings.method.clone(),
            url: settings.url.clone(),
            status: *status,
        },
        other => http_error(settings, other.to_string()),
    }
}
