//! Response decoding and log-safe URLs.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

/// Prefix some APIs (Gerrit) put in front of JSON to defeat XSSI.
const XSSI_PREFIX: &str = ")]}'";

/// Longest error body kept in an `HttpError::Status`.
const MAX_ERROR_BODY: usize = 200;

lazy_static! {
  static ref CREDENTIAL_PARAM: Regex = Regex::new(r"(token|key)=([^&]*)(&|$)").unwrap();
}

/// Replace the values of credential-bearing query parameters with `XXX`.
///
/// Matches any parameter whose name ends in `key` or `token`, so `api_key`
/// is covered as well.
pub fn redact_url(url: &str) -> String {
  CREDENTIAL_PARAM.replace_all(url, "${1}=XXX${3}").into_owned()
}

/// First line of an error body, cut to a loggable length.
pub fn truncate_error_body(body: &str) -> String {
  let first_line = body.lines().next().unwrap_or_default();
  first_line.chars().take(MAX_ERROR_BODY).collect()
}

/// Decode a successful response body.
///
/// JSON content types are parsed (after stripping the XSSI guard line when
/// present); everything else passes through as a JSON string.
pub fn decode_body(content_type: Option<&str>, text: String) -> Result<Value, serde_json::Error> {
  let is_json = content_type
    .map(|ct| ct.trim_start().starts_with("application/json"))
    .unwrap_or(false);
  if !is_json {
    return Ok(Value::String(text));
  }

  if text.starts_with(XSSI_PREFIX) {
    let json = text.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    return serde_json::from_str(json);
  }
  serde_json::from_str(&text)
}
