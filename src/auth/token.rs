//! Stateless admin credential: `base64(payload) + "." + hex(hmac_sha256(payload))`.
//!
//! Nothing is stored server-side. A token is valid for as long as the signing
//! secret it was issued under stays the same.

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The only identity this server recognizes.
pub const ADMIN_PAYLOAD: &str = "admin";

const SEPARATOR: char = '.';

fn mac_for(secret: &[u8], payload: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(payload);
    mac
}

/// Sign `payload` with `secret` and return the encoded token.
pub fn sign(payload: &str, secret: &[u8]) -> String {
    let code = mac_for(secret, payload.as_bytes()).finalize().into_bytes();
    format!("{}{}{}", STANDARD.encode(payload), SEPARATOR, hex::encode(code))
}

/// Returns `true` only for a well-formed admin token signed with `secret`.
/// Every malformed input reduces to `false`.
pub fn verify(token: &str, secret: &[u8]) -> bool {
    let Some((encoded, signature)) = token.split_once(SEPARATOR) else {
        return false;
    };
    if signature.contains(SEPARATOR) {
        return false;
    }

    let Ok(payload) = STANDARD.decode(encoded) else {
        return false;
    };
    let Ok(signature) = hex::decode(signature) else {
        return false;
    };

    // verify_slice compares in constant time.
    if mac_for(secret, &payload).verify_slice(&signature).is_err() {
        return false;
    }

    payload == ADMIN_PAYLOAD.as_bytes()
}
