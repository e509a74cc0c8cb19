//! Password handshake negotiation and hash computation.
//!
//! Before `init`, a modern client advertises its supported hash
//! algorithms with the `handshake` command; the relay answers with the
//! chosen algorithm, an iteration count, and a server nonce. The client
//! combines the server nonce with a fresh random nonce of its own and
//! derives the `password_hash` argument for `init`.
//!
//! TOTP is deliberately unsupported: a relay that requires it gets a
//! fatal, non-retryable [`AuthError::TotpUnsupported`].

use std::num::NonZeroU32;

use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};

use crate::command::InitAuth;
use crate::error::AuthError;
use crate::object::Object;

/// Default client nonce length in bytes, before hex encoding.
pub const CLIENT_NONCE_LEN: usize = 16;

/// A password hash algorithm negotiable with the relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashAlgo {
    /// Clear-text password, no hashing.
    Plain,
    /// Single SHA-256 over nonces plus password.
    Sha256,
    /// Single SHA-512 over nonces plus password.
    Sha512,
    /// PBKDF2 with HMAC-SHA-256.
    Pbkdf2Sha256,
    /// PBKDF2 with HMAC-SHA-512.
    Pbkdf2Sha512,
}

impl HashAlgo {
    /// All supported algorithms in advertisement order, weakest first.
    pub const CLIENT_PREFERENCE: [HashAlgo; 5] = [
        HashAlgo::Plain,
        HashAlgo::Sha256,
        HashAlgo::Sha512,
        HashAlgo::Pbkdf2Sha256,
        HashAlgo::Pbkdf2Sha512,
    ];

    /// The name used on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Pbkdf2Sha256 => "pbkdf2+sha256",
            Self::Pbkdf2Sha512 => "pbkdf2+sha512",
        }
    }

    /// Parse a wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        Some(match name {
            "plain" => Self::Plain,
            "sha256" => Self::Sha256,
            "sha512" => Self::Sha512,
            "pbkdf2+sha256" => Self::Pbkdf2Sha256,
            "pbkdf2+sha512" => Self::Pbkdf2Sha512,
            _ => return None,
        })
    }
}

/// The relay's answer to the `handshake` command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HandshakeReply {
    /// Chosen algorithm, if the relay named one this client knows.
    pub algo: Option<HashAlgo>,
    /// Raw algorithm name from the relay, kept for error reporting.
    pub algo_name: String,
    /// PBKDF2 iteration count.
    pub iterations: u32,
    /// Server nonce, hex-encoded.
    pub nonce: Option<String>,
    /// Whether the relay requires TOTP.
    pub totp: bool,
}

impl HandshakeReply {
    /// Parse the handshake hashtable the relay sends back.
    ///
    /// Missing or oddly-typed fields fall back to defaults; the relay is
    /// free to omit keys.
    pub fn from_object(obj: &Object) -> Self {
        let str_of = |key: &str| -> Option<String> {
            obj.hashtable_get(key)
                .and_then(Object::as_str)
                .map(str::to_string)
        };
        let algo_name = str_of("password_hash_algo").unwrap_or_default();
        Self {
            algo: HashAlgo::from_wire(&algo_name),
            algo_name,
            iterations: str_of("password_hash_iterations")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            nonce: str_of("nonce"),
            totp: str_of("totp").as_deref() == Some("on"),
        }
    }
}

/// Generate a fresh random client nonce, hex-encoded.
///
/// One nonce per authentication attempt; never reused.
pub fn generate_client_nonce() -> String {
    let mut bytes = [0u8; CLIENT_NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

/// Derive the `init` authentication payload from a handshake reply.
///
/// # Errors
///
/// Fails fast on TOTP-requiring relays, unknown algorithms, missing
/// nonces, and zero iteration counts. All of these are non-retryable.
pub fn negotiate(reply: &HandshakeReply, password: &str) -> Result<InitAuth, AuthError> {
    if reply.totp {
        return Err(AuthError::TotpUnsupported);
    }

    match reply.algo {
        None if reply.algo_name.is_empty() => Ok(InitAuth::Password(password.to_string())),
        None => Err(AuthError::UnsupportedAlgorithm(reply.algo_name.clone())),
        Some(HashAlgo::Plain) => Ok(InitAuth::Password(password.to_string())),
        Some(algo) => {
            let server_nonce = reply.nonce.as_deref().ok_or(AuthError::MissingNonce)?;
            let client_nonce = generate_client_nonce();
            let hash =
                compute_password_hash(algo, server_nonce, &client_nonce, reply.iterations, password)?;
            Ok(InitAuth::Hash(hash))
        }
    }
}

/// Compute the `algorithm:salt[:iterations]:hash` blob for `init`.
///
/// The salt is the server nonce concatenated with the client nonce,
/// hex-decoded to bytes; the rendered salt field is the concatenated hex
/// text itself.
pub fn compute_password_hash(
    algo: HashAlgo,
    server_nonce: &str,
    client_nonce: &str,
    iterations: u32,
    password: &str,
) -> Result<String, AuthError> {
    let salt_hex = format!("{}{}", server_nonce, client_nonce);
    let salt = hex_decode(&salt_hex)?;

    match algo {
        HashAlgo::Plain => Ok(format!("plain:{}", password)),
        HashAlgo::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(&salt);
            hasher.update(password.as_bytes());
            Ok(format!(
                "sha256:{}:{}",
                salt_hex,
                hex_encode(&hasher.finalize())
            ))
        }
        HashAlgo::Sha512 => {
            let mut hasher = Sha512::new();
            hasher.update(&salt);
            hasher.update(password.as_bytes());
            Ok(format!(
                "sha512:{}:{}",
                salt_hex,
                hex_encode(&hasher.finalize())
            ))
        }
        HashAlgo::Pbkdf2Sha256 => {
            let dk = derive_pbkdf2(
                ring::pbkdf2::PBKDF2_HMAC_SHA256,
                32,
                iterations,
                &salt,
                password,
            )?;
            Ok(format!(
                "pbkdf2+sha256:{}:{}:{}",
                salt_hex,
                iterations,
                hex_encode(&dk)
            ))
        }
        HashAlgo::Pbkdf2Sha512 => {
            let dk = derive_pbkdf2(
                ring::pbkdf2::PBKDF2_HMAC_SHA512,
                64,
                iterations,
                &salt,
                password,
            )?;
            Ok(format!(
                "pbkdf2+sha512:{}:{}:{}",
                salt_hex,
                iterations,
                hex_encode(&dk)
            ))
        }
    }
}

/// Raw PBKDF2 derivation, exposed for test vectors.
pub fn derive_pbkdf2(
    prf: ring::pbkdf2::Algorithm,
    out_len: usize,
    iterations: u32,
    salt: &[u8],
    password: &str,
) -> Result<Vec<u8>, AuthError> {
    let iterations =
        NonZeroU32::new(iterations).ok_or(AuthError::InvalidIterations(iterations))?;
    let mut out = vec![0u8; out_len];
    ring::pbkdf2::derive(prf, iterations, salt, password.as_bytes(), &mut out);
    Ok(out)
}

/// Hex-encode bytes, lowercase.
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Decode a hex string into bytes.
pub fn hex_decode(hex: &str) -> Result<Vec<u8>, AuthError> {
    if hex.len() % 2 != 0 {
        return Err(AuthError::InvalidHex(hex.to_string()));
    }
    let mut out = Vec::with_capacity(hex.len() / 2);
    let bytes = hex.as_bytes();
    for pair in bytes.chunks_exact(2) {
        let hi = hex_nibble(pair[0]).ok_or_else(|| AuthError::InvalidHex(hex.to_string()))?;
        let lo = hex_nibble(pair[1]).ok_or_else(|| AuthError::InvalidHex(hex.to_string()))?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

fn hex_nibble(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for algo in HashAlgo::CLIENT_PREFERENCE {
            assert_eq!(HashAlgo::from_wire(algo.wire_name()), Some(algo));
        }
        assert_eq!(HashAlgo::from_wire("md5"), None);
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(hex_encode(&[0x00, 0xab, 0xff]), "00abff");
        assert_eq!(hex_decode("00abff").unwrap(), vec![0x00, 0xab, 0xff]);
        assert_eq!(hex_decode("00ABFF").unwrap(), vec![0x00, 0xab, 0xff]);
        assert!(hex_decode("0").is_err());
        assert!(hex_decode("zz").is_err());
    }

    #[test]
    fn test_client_nonce_is_fresh() {
        let a = generate_client_nonce();
        let b = generate_client_nonce();
        assert_eq!(a.len(), CLIENT_NONCE_LEN * 2);
        assert_ne!(a, b);
        assert!(hex_decode(&a).is_ok());
    }

    #[test]
    fn test_sha256_known_digest() {
        // Server nonce 0x61 ('a'), client nonce 0x62 ('b'), password "c":
        // the digest input is exactly b"abc".
        let hash = compute_password_hash(HashAlgo::Sha256, "61", "62", 0, "c").unwrap();
        assert_eq!(
            hash,
            "sha256:6162:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha512_known_digest() {
        let hash = compute_password_hash(HashAlgo::Sha512, "61", "62", 0, "c").unwrap();
        assert_eq!(
            hash,
            "sha512:6162:ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn test_pbkdf2_sha256_vector() {
        // RFC 7914 §11: PBKDF2-HMAC-SHA-256, P="passwd", S="salt", c=1.
        let dk = derive_pbkdf2(ring::pbkdf2::PBKDF2_HMAC_SHA256, 32, 1, b"salt", "passwd").unwrap();
        assert_eq!(
            hex_encode(&dk),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[test]
    fn test_pbkdf2_sha512_vector() {
        // PBKDF2-HMAC-SHA-512, P="password", S="salt", c=1, dkLen=64.
        let dk =
            derive_pbkdf2(ring::pbkdf2::PBKDF2_HMAC_SHA512, 64, 1, b"salt", "password").unwrap();
        assert_eq!(
            hex_encode(&dk),
            "867f70cf1ade02cff3752599a3a53dc4af34c7a669815ae5d513554e1c8cf252\
             c02d470a285a0501bad999bfe943c08f050235d7d68b1da55e63f73b60a57fce"
        );
    }

    #[test]
    fn test_pbkdf2_is_deterministic() {
        let a = compute_password_hash(HashAlgo::Pbkdf2Sha256, "aabb", "ccdd", 100, "pw").unwrap();
        let b = compute_password_hash(HashAlgo::Pbkdf2Sha256, "aabb", "ccdd", 100, "pw").unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("pbkdf2+sha256:aabbccdd:100:"));
    }

    #[test]
    fn test_totp_required_is_fatal() {
        let reply = HandshakeReply {
            algo: Some(HashAlgo::Sha256),
            algo_name: "sha256".into(),
            iterations: 0,
            nonce: Some("aabb".into()),
            totp: true,
        };
        assert_eq!(negotiate(&reply, "pw"), Err(AuthError::TotpUnsupported));
    }

    #[test]
    fn test_negotiate_plain_and_missing() {
        let plain = HandshakeReply {
            algo: Some(HashAlgo::Plain),
            algo_name: "plain".into(),
            ..Default::default()
        };
        assert_eq!(
            negotiate(&plain, "pw").unwrap(),
            InitAuth::Password("pw".into())
        );

        let unknown = HandshakeReply {
            algo: None,
            algo_name: "md5".into(),
            ..Default::default()
        };
        assert_eq!(
            negotiate(&unknown, "pw"),
            Err(AuthError::UnsupportedAlgorithm("md5".into()))
        );

        let nonceless = HandshakeReply {
            algo: Some(HashAlgo::Sha256),
            algo_name: "sha256".into(),
            ..Default::default()
        };
        assert_eq!(negotiate(&nonceless, "pw"), Err(AuthError::MissingNonce));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let err = compute_password_hash(HashAlgo::Pbkdf2Sha256, "aa", "bb", 0, "pw").unwrap_err();
        assert_eq!(err, AuthError::InvalidIterations(0));
    }

    #[test]
    fn test_reply_from_hashtable() {
        let obj = Object::Hashtable(vec![
            (
                Object::Str(Some("password_hash_algo".into())),
                Object::Str(Some("pbkdf2+sha256".into())),
            ),
            (
                Object::Str(Some("password_hash_iterations".into())),
                Object::Str(Some("100000".into())),
            ),
            (
                Object::Str(Some("nonce".into())),
                Object::Str(Some("85b1ee00695a5b254e14f4885538df0d".into())),
            ),
            (
                Object::Str(Some("totp".into())),
                Object::Str(Some("off".into())),
            ),
        ]);
        let reply = HandshakeReply::from_object(&obj);
        assert_eq!(reply.algo, Some(HashAlgo::Pbkdf2Sha256));
        assert_eq!(reply.iterations, 100000);
        assert_eq!(reply.nonce.as_deref(), Some("85b1ee00695a5b254e14f4885538df0d"));
        assert!(!reply.totp);
    }
}
