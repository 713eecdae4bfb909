//! AWS Signature Version 4 request signing.
//!
//! Only what the adapters need: header-based signing, no query-string
//! presigning, no chunked payloads.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::AwsCredentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Everything about the request that goes into the signature.
#[derive(Debug, Clone)]
pub struct SigningInput<'a> {
    pub method: &'a str,
    /// Request path as sent on the wire (already percent-encoded once).
    pub path: &'a str,
    pub host: &'a str,
    /// Extra headers that will be sent and must be signed.
    pub headers: &'a [(String, String)],
    pub payload: &'a [u8],
    pub region: &'a str,
    pub service: &'a str,
    /// S3 signs the path as sent; every other service encodes it again.
    pub double_encode_path: bool,
    /// Send and sign `x-amz-content-sha256` (required by S3).
    pub content_sha256_header: bool,
}

/// Headers to add to the request: `x-amz-date`, `x-amz-content-sha256` when
/// asked for, `x-amz-security-token` when a session token is present, and
/// `authorization`.
pub fn sign(
    input: &SigningInput<'_>,
    credentials: &AwsCredentials,
    now: DateTime<Utc>,
) -> Vec<(String, String)> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let payload_hash = hex::encode(Sha256::digest(input.payload));

    let mut added = vec![("x-amz-date".to_string(), amz_date.clone())];
    if input.content_sha256_header {
        added.push(("x-amz-content-sha256".to_string(), payload_hash.clone()));
    }
    if let Some(token) = &credentials.session_token {
        added.push(("x-amz-security-token".to_string(), token.clone()));
    }

    let mut signed: Vec<(String, String)> = input
        .headers
        .iter()
        .chain(added.iter())
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
        .chain(std::iter::once(("host".to_string(), input.host.to_string())))
        .collect();
    signed.sort();

    let signed_headers = signed
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_path = if input.double_encode_path {
        uri_encode(input.path, false)
    } else {
        input.path.to_string()
    };

    let canonical_request = canonical_request(
        input.method,
        &canonical_path,
        &signed,
        &signed_headers,
        &payload_hash,
    );

    let scope = format!(
        "{date}/{region}/{service}/aws4_request",
        region = input.region,
        service = input.service
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = signing_key(
        &credentials.secret_access_key,
        &date,
        input.region,
        input.service,
    );
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

    added.push((
        "authorization".to_string(),
        format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        ),
    ));
    added
}

fn canonical_request(
    method: &str,
    path: &str,
    headers: &[(String, String)],
    signed_headers: &str,
    payload_hash: &str,
) -> String {
    let mut out = String::new();
    out.push_str(method);
    out.push('\n');
    out.push_str(if path.is_empty() { "/" } else { path });
    // No query strings are ever sent.
    out.push_str("\n\n");
    for (k, v) in headers {
        out.push_str(k);
        out.push(':');
        out.push_str(v);
        out.push('\n');
    }
    out.push('\n');
    out.push_str(signed_headers);
    out.push('\n');
    out.push_str(payload_hash);
    out
}

pub fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("hmac key length is unrestricted"),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Percent-encode everything outside the unreserved set. `/` is kept unless
/// `encode_slash` is set.
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn example_credentials() -> AwsCredentials {
        AwsCredentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
    }

    #[test]
    fn derives_documented_signing_key() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn matches_get_vanilla_test_vector() {
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        let headers = Vec::new();
        let input = SigningInput {
            method: "GET",
            path: "/",
            host: "example.amazonaws.com",
            headers: &headers,
            payload: b"",
            region: "us-east-1",
            service: "service",
            double_encode_path: true,
            content_sha256_header: false,
        };
        let added = sign(&input, &example_credentials(), now);
        let auth = &added.last().unwrap().1;
        assert_eq!(
            auth,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn authorization_header_shape() {
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        let headers = vec![(
            "Content-Type".to_string(),
            "application/x-amz-json-1.1".to_string(),
        )];
        let input = SigningInput {
            method: "POST",
            path: "/",
            host: "firehose.us-east-1.amazonaws.com",
            headers: &headers,
            payload: b"{}",
            region: "us-east-1",
            service: "firehose",
            double_encode_path: true,
            content_sha256_header: false,
        };
        let added = sign(&input, &example_credentials(), now);

        let get = |name: &str| {
            added
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("x-amz-date"), "20150830T123600Z");
        let auth = get("authorization");
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/firehose/aws4_request, "
        ));
        assert!(auth.contains("SignedHeaders=content-type;host;x-amz-date, "));
        let sig = auth.rsplit("Signature=").next().unwrap();
        assert_eq!(sig.len(), 64);
        assert!(added.iter().all(|(k, _)| k != "x-amz-security-token"));
    }

    #[test]
    fn signing_is_deterministic_and_time_sensitive() {
        let headers = Vec::new();
        let input = SigningInput {
            method: "GET",
            path: "/bucket/key",
            host: "s3.us-east-1.amazonaws.com",
            headers: &headers,
            payload: b"",
            region: "us-east-1",
            service: "s3",
            double_encode_path: false,
            content_sha256_header: true,
        };
        let creds = example_credentials();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap();
        let signed = sign(&input, &creds, t1);
        assert_eq!(signed, sign(&input, &creds, t1));
        assert!(signed.iter().any(|(k, _)| k == "x-amz-content-sha256"));
        assert_ne!(sign(&input, &creds, t1), sign(&input, &creds, t2));
    }

    #[test]
    fn session_token_is_signed() {
        let creds = example_credentials().with_session_token("token-1");
        let headers = Vec::new();
        let input = SigningInput {
            method: "GET",
            path: "/",
            host: "example.amazonaws.com",
            headers: &headers,
            payload: b"",
            region: "us-east-1",
            service: "service",
            double_encode_path: true,
            content_sha256_header: false,
        };
        let added = sign(&input, &creds, Utc::now());
        assert!(added
            .iter()
            .any(|(k, v)| k == "x-amz-security-token" && v == "token-1"));
        let auth = &added.last().unwrap().1;
        assert!(auth.contains("x-amz-security-token"));
    }

    #[test]
    fn uri_encoding_rules() {
        assert_eq!(uri_encode("/model/a.b-c_d~e/invoke", false), "/model/a.b-c_d~e/invoke");
        assert_eq!(uri_encode("/model/x%3A0/invoke", false), "/model/x%253A0/invoke");
        assert_eq!(uri_encode("a b/c", true), "a%20b%2Fc");
    }
}
