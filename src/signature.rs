//! HMAC-SHA256 request signing for the partner gateway.
//!
//! The signed string is `path + key1 + value1 + key2 + value2 + ... + secret`
//! over the top-level parameters merged on top of the `data` object, keys in
//! byte order. The digest is base64 encoded and then query-escaped.

use std::collections::BTreeMap;

use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::{ClientError, Result};

type HmacSha256 = Hmac<Sha256>;

const DATA_KEY: &str = "data";

/// Computes the `sign` field for a parameter envelope.
pub fn sign_parameters(
    request_path: &str,
    params: &Map<String, Value>,
    app_secret: &str,
) -> Result<String> {
    let message = signing_string(request_path, params, app_secret);

    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .map_err(|err| ClientError::Signature(format!("failed to create HMAC: {err}")))?;
    mac.update(message.as_bytes());
    let digest = mac.finalize().into_bytes();

    let encoded = base64::engine::general_purpose::STANDARD.encode(digest);
    Ok(urlencoding::encode(&encoded).into_owned())
}

/// Builds the plain string that gets signed.
pub fn signing_string(request_path: &str, params: &Map<String, Value>, app_secret: &str) -> String {
    let mut merged: BTreeMap<&str, &Value> = BTreeMap::new();
    if let Some(Value::Object(data)) = params.get(DATA_KEY) {
        merged.extend(data.iter().map(|(key, value)| (key.as_str(), value)));
    }
    merged.extend(params.iter().map(|(key, value)| (key.as_str(), value)));
    merged.remove(DATA_KEY);

    let mut message = String::from(request_path);
    for (key, value) in merged {
        message.push_str(key);
        write_value(value, &mut message);
    }
    message.push_str(app_secret);
    message
}

/// Renders a value the way the gateway stringifies parameters.
fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("<nil>"),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Number(number) => write_number(number, out),
        Value::String(text) => out.push_str(text),
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(' ');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(entries) => {
            let sorted: BTreeMap<&String, &Value> = entries.iter().collect();
            out.push_str("map[");
            for (index, (key, item)) in sorted.into_iter().enumerate() {
                if index > 0 {
                    out.push(' ');
                }
                out.push_str(key);
                out.push(':');
                write_value(item, out);
            }
            out.push(']');
        }
    }
}

fn write_number(number: &serde_json::Number, out: &mut String) {
    if number.is_i64() || number.is_u64() {
        out.push_str(&number.to_string());
        return;
    }
    let Some(float) = number.as_f64() else {
        out.push_str(&number.to_string());
        return;
    };

    let magnitude = float.abs();
    if magnitude != 0.0 && !(1e-4..1e21).contains(&magnitude) {
        // Shortest mantissa, signed exponent padded to two digits: 1e-05, 1.5e+21.
        let formatted = format!("{float:e}");
        match formatted.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                out.push_str(&format!("{mantissa}e{sign}{digits:0>2}"));
            }
            None => out.push_str(&formatted),
        }
    } else {
        out.push_str(&format!("{float}"));
    }
}
