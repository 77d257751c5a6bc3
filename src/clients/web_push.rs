use std::{
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    time::Duration,
};

use aes_gcm::{Aes128Gcm, KeyInit, Nonce, aead::Aead};
use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use base64::Engine as _;
use chrono::Utc;
use hkdf::Hkdf;
use p256::{
    PublicKey,
    ecdh::EphemeralSecret,
    ecdsa::{Signature, SigningKey, signature::Signer},
    elliptic_curve::{
        rand_core::{OsRng, RngCore},
        sec1::ToEncodedPoint,
    },
};
use parking_lot::Mutex;
use reqwest::{Client, Response};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, info};
use url::{Host, Url};

use crate::{
    fanout::DeliveryTransport,
    models::{
        endpoint::EndpointRecord, notification::Category, payload::Payload,
        status::DeliveryStatus,
    },
    utils::truncate_chars,
};

const SALT_LEN: usize = 16;
const PUBLIC_KEY_LEN: usize = 65;
const AUTH_SECRET_LEN: usize = 16;
const RECORD_SIZE: u32 = 4096;
const MAX_PAYLOAD_BYTES: usize = 3500;
const VAPID_JWT_EXP_SECS: i64 = 12 * 60 * 60;
const VAPID_JWT_SKEW_SECS: i64 = 60;
const MAX_TOPIC_LEN: usize = 32;

const IKM_INFO_PREFIX: &[u8] = b"WebPush: info\0";
const KEY_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";

/// Application server identity (RFC 8292). Keys are base64url without
/// padding: the public key as an uncompressed P-256 point, the private key
/// as its 32-byte scalar.
#[derive(Clone)]
pub struct VapidKeys {
    public_key_b64: String,
    private_key_raw: [u8; 32],
    subject: String,
}

impl VapidKeys {
    pub fn new(public_key_b64: &str, private_key_b64: &str, subject: &str) -> Result<Self, Error> {
        let public_key_b64 = public_key_b64.trim();

        let public_raw = decode_b64url(public_key_b64)
            .map_err(|e| anyhow!("Invalid VAPID public key: {}", e))?;
        let private_raw = decode_b64url(private_key_b64.trim())
            .map_err(|e| anyhow!("Invalid VAPID private key: {}", e))?;

        let private_key_raw: [u8; 32] = private_raw
            .try_into()
            .map_err(|_| anyhow!("VAPID private key must decode to 32 bytes"))?;
        if public_raw.len() != PUBLIC_KEY_LEN {
            return Err(anyhow!(
                "VAPID public key must decode to {} bytes",
                PUBLIC_KEY_LEN
            ));
        }

        let signing_key = SigningKey::from_bytes((&private_key_raw).into())
            .map_err(|_| anyhow!("Invalid VAPID private key"))?;
        let derived = PublicKey::from(signing_key.verifying_key()).to_encoded_point(false);
        if derived.as_bytes() != public_raw.as_slice() {
            return Err(anyhow!("VAPID public key does not match the private key"));
        }

        Ok(Self {
            public_key_b64: public_key_b64.to_string(),
            private_key_raw,
            subject: subject.to_string(),
        })
    }

    pub fn public_key(&self) -> &str {
        &self.public_key_b64
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl Debug for VapidKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("VapidKeys")
            .field("public_key", &self.public_key_b64)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
struct CachedVapidJwt {
    jwt: String,
    exp_unix: i64,
}

/// Keys and audience taken from one endpoint record.
struct Subscription {
    audience: String,
    p256dh: [u8; PUBLIC_KEY_LEN],
    auth: [u8; AUTH_SECRET_LEN],
}

impl Subscription {
    fn parse(endpoint: &EndpointRecord) -> Result<Self, Error> {
        let audience = push_service_audience(&endpoint.endpoint_uri)?;

        let p256dh: [u8; PUBLIC_KEY_LEN] = decode_b64url(&endpoint.p256dh)
            .map_err(|e| anyhow!("Invalid p256dh key: {}", e))?
            .try_into()
            .map_err(|_| anyhow!("Invalid p256dh key length"))?;
        let auth: [u8; AUTH_SECRET_LEN] = decode_b64url(&endpoint.auth_secret)
            .map_err(|e| anyhow!("Invalid auth secret: {}", e))?
            .try_into()
            .map_err(|_| anyhow!("Invalid auth secret length"))?;

        Ok(Self {
            audience,
            p256dh,
            auth,
        })
    }
}

/// Delivery transport for browser push subscriptions: RFC 8291 message
/// encryption with VAPID authentication.
pub struct WebPushClient {
    http_client: Client,
    vapid: VapidKeys,
    ttl_seconds: u64,
    jwt_cache: Mutex<HashMap<String, CachedVapidJwt>>,
}

impl WebPushClient {
    pub fn new(
        vapid: VapidKeys,
        ttl_seconds: u64,
        request_timeout: Duration,
    ) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(subject = %vapid.subject, "Web Push client initialized");

        Ok(Self {
            http_client,
            vapid,
            ttl_seconds,
            jwt_cache: Mutex::new(HashMap::new()),
        })
    }

    fn vapid_jwt(&self, audience: &str) -> Result<String, Error> {
        let now = Utc::now().timestamp();
        if let Some(entry) = self.jwt_cache.lock().get(audience)
            && entry.exp_unix - VAPID_JWT_SKEW_SECS > now
        {
            return Ok(entry.jwt.clone());
        }

        let (jwt, exp_unix) = build_vapid_jwt(
            audience,
            &self.vapid.subject,
            &self.vapid.private_key_raw,
            now + VAPID_JWT_EXP_SECS,
        )?;
        self.jwt_cache.lock().insert(
            audience.to_string(),
            CachedVapidJwt {
                jwt: jwt.clone(),
                exp_unix,
            },
        );

        Ok(jwt)
    }
}

#[async_trait]
impl DeliveryTransport for WebPushClient {
    async fn send(
        &self,
        endpoint: &EndpointRecord,
        payload: &Payload,
    ) -> Result<DeliveryStatus, Error> {
        // A record this transport cannot address says nothing about whether
        // the subscription is alive.
        let subscription = match Subscription::parse(endpoint) {
            Ok(subscription) => subscription,
            Err(e) => {
                return Ok(DeliveryStatus::RetryableFailure(format!(
                    "Not deliverable over Web Push: {}",
                    e
                )));
            }
        };

        let plaintext = serde_json::to_vec(payload)?;
        if plaintext.len() > MAX_PAYLOAD_BYTES {
            return Err(anyhow!(
                "Payload is {} bytes, above the {} byte limit",
                plaintext.len(),
                MAX_PAYLOAD_BYTES
            ));
        }

        let jwt = self.vapid_jwt(&subscription.audience)?;
        let body = encrypt_aes128gcm(&plaintext, &subscription.p256dh, &subscription.auth)?;

        debug!(endpoint_id = endpoint.id, tag = %payload.tag, "Sending web push notification");

        let mut request = self
            .http_client
            .post(&endpoint.endpoint_uri)
            .header("TTL", self.ttl_seconds.to_string())
            .header("Content-Encoding", "aes128gcm")
            .header("Content-Type", "application/octet-stream")
            .header("Urgency", urgency(payload.data.category))
            .header(
                "Authorization",
                format!("vapid t={}, k={}", jwt, self.vapid.public_key_b64),
            );
        if is_valid_topic(&payload.tag) {
            request = request.header("Topic", &payload.tag);
        }

        let response = request.body(body).send().await?;

        let status = response.status();
        if status.is_success() {
            debug!(endpoint_id = endpoint.id, "Push service accepted notification");
            return Ok(DeliveryStatus::Delivered);
        }

        let retry_after = retry_after_secs(&response);
        let body = response.text().await.unwrap_or_default();
        debug!(
            endpoint_id = endpoint.id,
            status = status.as_u16(),
            body = %truncate_chars(&body, 200),
            "Push service rejected notification"
        );

        Ok(classify_push_response(status.as_u16(), retry_after))
    }
}

/// Maps a push service answer onto a delivery status. Only 404 and 410 mean
/// the subscription is gone; everything else may be a problem on our side
/// or the service's.
pub fn classify_push_response(status: u16, retry_after_secs: Option<u64>) -> DeliveryStatus {
    match (status, retry_after_secs) {
        (404 | 410, _) => DeliveryStatus::PermanentFailure(format!(
            "Push service returned {}: subscription expired",
            status
        )),
        (_, Some(secs)) => DeliveryStatus::RetryableFailure(format!(
            "Push service returned {} (retry after {}s)",
            status, secs
        )),
        _ => DeliveryStatus::RetryableFailure(format!("Push service returned {}", status)),
    }
}

fn urgency(category: Category) -> &'static str {
    match category {
        Category::Alert => "high",
        Category::General => "normal",
    }
}

fn is_valid_topic(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= MAX_TOPIC_LEN
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}

fn retry_after_secs(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("Retry-After")?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Origin of the push service, used as the VAPID `aud` claim.
pub fn push_service_audience(endpoint_uri: &str) -> Result<String, Error> {
    let url = Url::parse(endpoint_uri).map_err(|e| anyhow!("Invalid push endpoint URL: {}", e))?;
    if !matches!(url.scheme(), "https" | "http") {
        return Err(anyhow!("Unsupported push endpoint scheme '{}'", url.scheme()));
    }

    let host = match url.host().ok_or_else(|| anyhow!("Push endpoint missing host"))? {
        Host::Domain(domain) => domain.to_string(),
        Host::Ipv4(ip) => ip.to_string(),
        Host::Ipv6(ip) => format!("[{}]", ip),
    };

    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Browsers hand out base64url keys, but some registration code stores them
/// in the standard alphabet.
fn decode_b64url(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let trimmed = input.trim().trim_end_matches('=');
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(trimmed))
}

fn encode_b64url(input: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(input)
}

fn hkdf_sha256(salt: &[u8], ikm: &[u8], info: &[u8], len: usize) -> Result<Vec<u8>, Error> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = vec![0u8; len];
    hk.expand(info, &mut okm)
        .map_err(|_| anyhow!("HKDF expand failed"))?;
    Ok(okm)
}

/// Encrypts `plaintext` as a single aes128gcm record (RFC 8188/8291) and
/// returns the request body: salt, record size, sender key, ciphertext.
pub fn encrypt_aes128gcm(
    plaintext: &[u8],
    ua_public: &[u8; PUBLIC_KEY_LEN],
    auth_secret: &[u8; AUTH_SECRET_LEN],
) -> Result<Vec<u8>, Error> {
    if plaintext.is_empty() {
        return Err(anyhow!("Web push payload cannot be empty"));
    }

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let ua_key =
        PublicKey::from_sec1_bytes(ua_public).map_err(|_| anyhow!("Invalid p256dh key"))?;

    let local_secret = EphemeralSecret::random(&mut OsRng);
    let local_public = PublicKey::from(&local_secret).to_encoded_point(false);
    let local_public = local_public.as_bytes();
    if local_public.len() != PUBLIC_KEY_LEN {
        return Err(anyhow!("Invalid local public key length"));
    }

    let shared_secret = local_secret.diffie_hellman(&ua_key);

    let mut ikm_info = Vec::with_capacity(IKM_INFO_PREFIX.len() + PUBLIC_KEY_LEN * 2);
    ikm_info.extend_from_slice(IKM_INFO_PREFIX);
    ikm_info.extend_from_slice(ua_public);
    ikm_info.extend_from_slice(local_public);

    let ikm = hkdf_sha256(
        auth_secret,
        shared_secret.raw_secret_bytes().as_slice(),
        &ikm_info,
        32,
    )?;
    let cek = hkdf_sha256(&salt, &ikm, KEY_INFO, 16)?;
    let nonce = hkdf_sha256(&salt, &ikm, NONCE_INFO, 12)?;

    let cipher = Aes128Gcm::new_from_slice(&cek).map_err(|_| anyhow!("Invalid CEK length"))?;

    // Single record: content followed by the 0x02 last-record delimiter.
    let mut padded = Vec::with_capacity(plaintext.len() + 1);
    padded.extend_from_slice(plaintext);
    padded.push(2);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), padded.as_slice())
        .map_err(|_| anyhow!("AES-GCM encryption failed"))?;

    let mut body = Vec::with_capacity(SALT_LEN + 4 + 1 + PUBLIC_KEY_LEN + ciphertext.len());
    body.extend_from_slice(&salt);
    body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    body.push(PUBLIC_KEY_LEN as u8);
    body.extend_from_slice(local_public);
    body.extend_from_slice(&ciphertext);

    Ok(body)
}

fn build_vapid_jwt(
    audience: &str,
    subject: &str,
    private_key_raw: &[u8; 32],
    exp_unix: i64,
) -> Result<(String, i64), Error> {
    #[derive(Serialize)]
    struct Claims<'a> {
        aud: &'a str,
        exp: i64,
        sub: &'a str,
    }

    let header = serde_json::json!({ "typ": "JWT", "alg": "ES256" });
    let claims = Claims {
        aud: audience,
        exp: exp_unix,
        sub: subject,
    };

    let signing_input = format!(
        "{}.{}",
        encode_b64url(serde_json::to_string(&header)?.as_bytes()),
        encode_b64url(serde_json::to_string(&claims)?.as_bytes())
    );

    let signing_key = SigningKey::from_bytes(private_key_raw.into())
        .map_err(|_| anyhow!("Invalid VAPID private key"))?;
    let signature: Signature = signing_key.sign(signing_input.as_bytes());

    Ok((
        format!("{}.{}", signing_input, encode_b64url(&signature.to_bytes())),
        exp_unix,
    ))
}
