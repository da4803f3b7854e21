//! Signed and encrypted cookie values.
//!
//! Signed values are `value.signature`, where the signature is the
//! HMAC-SHA256 of the value, base64url encoded without padding. Encrypted
//! values are `iv.tag.ciphertext` under AES-256-GCM with a key derived as
//! SHA-256 of the secret. Verification and decryption fail closed: any
//! tampering yields `None`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::config::validate_secret;
use crate::error::{EdgeError, Result};

type HmacSha256 = Hmac<Sha256>;

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Signs, verifies, encrypts and decrypts cookie values with one secret.
#[derive(Clone)]
pub struct CookieSigner {
    mac: HmacSha256,
    cipher: Aes256Gcm,
}

impl CookieSigner {
    /// Fails when the secret is shorter than 32 bytes.
    pub fn new(secret: &str) -> Result<Self> {
        validate_secret("signing", secret)?;
        let mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
            .map_err(|err| EdgeError::Config(err.to_string()))?;
        let key = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|err| EdgeError::Config(err.to_string()))?;
        Ok(Self { mac, cipher })
    }

    fn signature(&self, value: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(value.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    pub fn sign(&self, value: &str) -> String {
        format!("{value}.{}", URL_SAFE_NO_PAD.encode(self.signature(value)))
    }

    /// The original value, or `None` if the signature does not match.
    pub fn unsign(&self, signed: &str) -> Option<String> {
        let (value, signature) = signed.rsplit_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(value.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(value.to_string())
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|_| EdgeError::Encryption)?;
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        Ok(format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(iv),
            URL_SAFE_NO_PAD.encode(tag),
            URL_SAFE_NO_PAD.encode(ciphertext)
        ))
    }

    /// The plaintext, or `None` on a malformed or forged value.
    pub fn decrypt(&self, encrypted: &str) -> Option<String> {
        let mut parts = encrypted.split('.');
        let iv = URL_SAFE_NO_PAD.decode(parts.next()?).ok()?;
        let tag = URL_SAFE_NO_PAD.decode(parts.next()?).ok()?;
        let mut sealed = URL_SAFE_NO_PAD.decode(parts.next()?).ok()?;
        if parts.next().is_some() || iv.len() != IV_LEN || tag.len() != TAG_LEN {
            return None;
        }

        sealed.extend_from_slice(&tag);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&iv), sealed.as_ref())
            .ok()?;
        String::from_utf8(plaintext).ok()
    }
}

impl std::fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSigner").finish_non_exhaustive()
    }
}

/// A random token, base64url encoded.
pub fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}
