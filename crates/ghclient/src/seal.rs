//! Sealing secret values for the organization secrets API.
//!
//! Secret values are write-only: they are encrypted client-side with an
//! anonymous sealed box to the organization public key and can never be
//! read back.

use crate::error::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use crypto_box::aead::OsRng;

/// Seal `plaintext` to a base64 public key, returning the base64 ciphertext.
///
/// # Errors
///
/// Returns `Error::Encryption` if the key is not valid base64, is not
/// 32 bytes long, or sealing fails.
pub fn seal_secret(public_key_b64: &str, plaintext: &str) -> Result<String> {
    let raw = STANDARD
        .decode(public_key_b64)
        .map_err(|e| Error::Encryption(format!("invalid public key encoding: {e}")))?;

    let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
        Error::Encryption(format!("public key must be 32 bytes, got {}", raw.len()))
    })?;

    let sealed = crypto_box::PublicKey::from(bytes)
        .seal(&mut OsRng, plaintext.as_bytes())
        .map_err(|e| Error::Encryption(e.to_string()))?;

    Ok(STANDARD.encode(sealed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_box::SecretKey;

    #[test]
    fn test_sealed_value_opens_with_matching_secret_key() {
        let secret_key = SecretKey::generate(&mut OsRng);
        let public_b64 = STANDARD.encode(secret_key.public_key().as_bytes());

        let sealed = seal_secret(&public_b64, "hunter2").unwrap();
        let ciphertext = STANDARD.decode(sealed).unwrap();
        let opened = secret_key.unseal(&ciphertext).unwrap();

        assert_eq!(opened, b"hunter2");
    }

    #[test]
    fn test_sealing_is_randomized() {
        let secret_key = SecretKey::generate(&mut OsRng);
        let public_b64 = STANDARD.encode(secret_key.public_key().as_bytes());

        let a = seal_secret(&public_b64, "same").unwrap();
        let b = seal_secret(&public_b64, "same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(matches!(
            seal_secret("not base64!!", "x"),
            Err(Error::Encryption(_))
        ));
        let short = STANDARD.encode([1u8; 16]);
        let err = seal_secret(&short, "x").unwrap_err();
        assert!(err.to_string().contains("32 bytes"));
    }
}
