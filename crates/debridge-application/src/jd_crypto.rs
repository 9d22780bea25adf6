// SPDX-License-Identifier: GPL-3.0-or-later

//! Key derivation, request signing and payload encryption for the My.JDownloader API.
//!
//! Every secret is a SHA-256 digest. Its first half is the AES-128-CBC IV and
//! its second half the key; payloads travel base64 encoded with PKCS#7 padding.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::download_agent::DownloadAgentError;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type HmacSha256 = Hmac<Sha256>;

pub(crate) type Secret = [u8; 32];

/// Account secret for one domain (`"server"` or `"device"`).
pub(crate) fn account_secret(email: &str, password: &str, domain: &str) -> Secret {
    let mut hasher = Sha256::new();
    hasher.update(email.to_lowercase().as_bytes());
    hasher.update(password.as_bytes());
    hasher.update(domain.as_bytes());
    hasher.finalize().into()
}

/// Bind a secret to a session token handed out by `/my/connect`.
pub(crate) fn session_secret(secret: &Secret, session_token: &str) -> Result<Secret, DownloadAgentError> {
    let token = decode_hex(session_token)?;
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(&token);
    Ok(hasher.finalize().into())
}

/// Lowercase hex HMAC-SHA256 of `data`.
pub(crate) fn sign(key: &[u8], data: &str) -> Result<String, DownloadAgentError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| DownloadAgentError::Crypto(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(format!("{:x}", mac.finalize().into_bytes()))
}

pub(crate) fn encrypt(secret: &Secret, plaintext: &str) -> Result<String, DownloadAgentError> {
    let (iv, key) = secret.split_at(16);
    let cipher = Aes128CbcEnc::new_from_slices(key, iv)
        .map_err(|e| DownloadAgentError::Crypto(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    Ok(STANDARD.encode(ciphertext))
}

pub(crate) fn decrypt(secret: &Secret, payload: &str) -> Result<String, DownloadAgentError> {
    let ciphertext = STANDARD
        .decode(payload.trim())
        .map_err(|e| DownloadAgentError::Crypto(format!("payload is not base64: {e}")))?;
    let (iv, key) = secret.split_at(16);
    let cipher = Aes128CbcDec::new_from_slices(key, iv)
        .map_err(|e| DownloadAgentError::Crypto(e.to_string()))?;
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| DownloadAgentError::Crypto("payload could not be decrypted".to_string()))?;
    String::from_utf8(plaintext)
        .map_err(|e| DownloadAgentError::Crypto(format!("payload is not utf-8: {e}")))
}

fn decode_hex(value: &str) -> Result<Vec<u8>, DownloadAgentError> {
    if value.len() % 2 != 0 || !value.is_ascii() {
        return Err(DownloadAgentError::Crypto(format!("malformed session token {value}")));
    }
    (0..value.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&value[i..i + 2], 16)
                .map_err(|_| DownloadAgentError::Crypto(format!("malformed session token {value}")))
        })
        .collect()
}
