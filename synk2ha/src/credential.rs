use std::fmt;
use std::fs;
use std::path::Path;

use base64::Engine as _;
use log::{debug, info};
use rand_core::OsRng;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use serde_derive::Deserialize;
use serde_json::Value;

use crate::cloud::SunsynkCloud;
use crate::error::{BridgeError, BridgeResult};
use crate::http_wrapper::HttpWrapper;
use crate::scratch::ScratchArea;

/// A string that must never end up in a log line.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Username plus both password forms. Built fresh every cycle and dropped
/// with it.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: Secret,
    pub encrypted_password: Secret,
}

static PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----";
static PEM_FOOTER: &str = "-----END PUBLIC KEY-----";
static PEM_LINE_WIDTH: usize = 64;

/// Fetches the server's current public key (bare base64 or PEM).
pub fn fetch_public_key<H: HttpWrapper>(cloud: &mut SunsynkCloud<'_, H>) -> BridgeResult<String> {
    let nonce = chrono::Utc::now().timestamp_millis();
    let url = cloud.endpoints.public_key_url(nonce);

    let response = cloud
        .http
        .get(&url, None)
        .map_err(|e| BridgeError::KeyFetch(format!("{e:#}")))?;
    debug!("public key response ({}): {}", response.status, response.body);
    if !response.is_success() {
        return Err(BridgeError::KeyFetch(format!(
            "server answered with status {}",
            response.status
        )));
    }

    let document: Value = serde_json::from_str(&response.body)
        .map_err(|e| BridgeError::KeyFetch(format!("unparsable response: {e}")))?;
    match document.get("data") {
        Some(Value::String(key)) if !key.trim().is_empty() && key.trim() != "null" => {
            Ok(key.trim().to_string())
        }
        _ => Err(BridgeError::KeyFetch("key field absent or null".to_string())),
    }
}

/// Wraps bare base64 key material in SubjectPublicKeyInfo PEM framing.
pub fn pem_frame(key: &str) -> String {
    let key = key.trim();
    if key.starts_with("-----BEGIN") {
        return format!("{key}\n");
    }

    let body: Vec<char> = key.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pem = String::with_capacity(body.len() + 128);
    pem.push_str(PEM_HEADER);
    pem.push('\n');
    for line in body.chunks(PEM_LINE_WIDTH) {
        pem.extend(line);
        pem.push('\n');
    }
    pem.push_str(PEM_FOOTER);
    pem.push('\n');
    pem
}

/// Produces the encrypted password blob for this cycle.
///
/// The key and the plaintext are staged in a private scratch session that
/// is deleted when this function returns, whichever way it returns.
pub fn encrypt_password<H: HttpWrapper>(
    cloud: &mut SunsynkCloud<'_, H>,
    scratch: &ScratchArea,
    password: &Secret,
) -> BridgeResult<Secret> {
    let key = fetch_public_key(cloud)?;

    let session = scratch
        .session()
        .map_err(|e| BridgeError::Encryption(format!("cannot open scratch session: {e}")))?;
    let key_file = session
        .write("pubkey.pem", pem_frame(&key).as_bytes())
        .map_err(|e| BridgeError::Encryption(format!("cannot stage public key: {e}")))?;
    let password_file = session
        .write("password.txt", password.expose().as_bytes())
        .map_err(|e| BridgeError::Encryption(format!("cannot stage password: {e}")))?;

    let encrypted = encrypt_staged(&key_file, &password_file)?;
    info!("password encrypted with the server's public key");
    Ok(encrypted)
}

fn encrypt_staged(key_file: &Path, password_file: &Path) -> BridgeResult<Secret> {
    let pem = fs::read_to_string(key_file)
        .map_err(|e| BridgeError::Encryption(format!("cannot read staged key: {e}")))?;
    let plaintext = fs::read(password_file)
        .map_err(|e| BridgeError::Encryption(format!("cannot read staged password: {e}")))?;

    let key = RsaPublicKey::from_public_key_pem(&pem)
        .map_err(|e| BridgeError::Encryption(format!("invalid public key: {e}")))?;
    let ciphertext = key
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, &plaintext)
        .map_err(|e| BridgeError::Encryption(e.to_string()))?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(ciphertext);
    if encoded.is_empty() {
        return Err(BridgeError::Encryption(
            "encryption produced an empty blob".to_string(),
        ));
    }
    Ok(Secret(encoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::CloudEndpoints;
    use crate::test_support::{bare_public_key, decrypt, FakeHttp, Reply};
    use serde_json::json;

    fn endpoints() -> CloudEndpoints {
        CloudEndpoints::new("https://api.test", "https://alt.test")
    }

    fn key_reply(data: Value) -> Reply {
        Reply::json(200, json!({"code": 0, "msg": "Success", "data": data, "success": true}))
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let credentials = Credentials {
            username: "me".to_string(),
            password: Secret::new("hunter2"),
            encrypted_password: Secret::new("blob"),
        };
        let printed = format!("{credentials:?}");
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("blob"));
    }

    #[test]
    fn pem_frame_wraps_at_64_columns() {
        let key = "A".repeat(130);
        let pem = pem_frame(&key);
        let lines: Vec<&str> = pem.lines().collect();
        assert_eq!(lines[0], PEM_HEADER);
        assert_eq!(lines[1].len(), 64);
        assert_eq!(lines[2].len(), 64);
        assert_eq!(lines[3].len(), 2);
        assert_eq!(lines[4], PEM_FOOTER);
    }

    #[test]
    fn pem_frame_keeps_existing_framing() {
        let pem = "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----";
        assert_eq!(pem_frame(pem), format!("{pem}\n"));
    }

    #[test]
    fn encrypted_password_decrypts_to_plaintext() {
        let scratch_root = tempfile::tempdir().unwrap();
        let scratch = ScratchArea::new(scratch_root.path());
        let endpoints = endpoints();
        let mut http = FakeHttp::default().on(
            "GET",
            "api.test/anonymous/publicKey",
            key_reply(json!(bare_public_key())),
        );

        let mut cloud = SunsynkCloud::new(&mut http, &endpoints);
        let encrypted = encrypt_password(&mut cloud, &scratch, &Secret::new("hunter2")).unwrap();

        assert_eq!(decrypt(encrypted.expose()), "hunter2");
        assert_eq!(fs::read_dir(scratch_root.path()).unwrap().count(), 0);
    }

    #[test]
    fn null_or_missing_key_is_a_key_fetch_error() {
        let scratch_root = tempfile::tempdir().unwrap();
        let scratch = ScratchArea::new(scratch_root.path());
        let endpoints = endpoints();

        for data in [json!("null"), json!(null), json!("")] {
            let mut http =
                FakeHttp::default().on("GET", "api.test/anonymous/publicKey", key_reply(data));
            let mut cloud = SunsynkCloud::new(&mut http, &endpoints);
            let result = encrypt_password(&mut cloud, &scratch, &Secret::new("pw"));
            assert!(matches!(result, Err(BridgeError::KeyFetch(_))));
        }

        let mut http = FakeHttp::default().on(
            "GET",
            "api.test/anonymous/publicKey",
            Reply::Fail("connection refused".to_string()),
        );
        let mut cloud = SunsynkCloud::new(&mut http, &endpoints);
        let result = encrypt_password(&mut cloud, &scratch, &Secret::new("pw"));
        assert!(matches!(result, Err(BridgeError::KeyFetch(_))));
    }

    #[test]
    fn invalid_key_fails_and_still_cleans_scratch() {
        let scratch_root = tempfile::tempdir().unwrap();
        let scratch = ScratchArea::new(scratch_root.path());
        let endpoints = endpoints();
        let mut http = FakeHttp::default().on(
            "GET",
            "api.test/anonymous/publicKey",
            key_reply(json!("bm90IGEga2V5")),
        );

        let mut cloud = SunsynkCloud::new(&mut http, &endpoints);
        let result = encrypt_password(&mut cloud, &scratch, &Secret::new("pw"));

        assert!(matches!(result, Err(BridgeError::Encryption(_))));
        assert_eq!(fs::read_dir(scratch_root.path()).unwrap().count(), 0);
    }
}
