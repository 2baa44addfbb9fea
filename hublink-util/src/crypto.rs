use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("signing key is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("signing key has an invalid length")]
    InvalidLength(#[from] hmac::digest::InvalidLength),
}

/// Sign `data` with HMAC-SHA256.
///
/// The key is expected base64-encoded, which is how shared access keys are
/// distributed. The digest is returned base64-encoded as well.
pub fn hmac_sha256_base64<D: AsRef<[u8]>>(key: &str, data: D) -> Result<String, SigningError> {
    let key = STANDARD.decode(key.trim())?;
    let mut mac = HmacSha256::new_from_slice(&key)?;
    mac.update(data.as_ref());
    let digest = mac.finalize().into_bytes();
    Ok(STANDARD.encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    // base64("hublink-device-secret-0123456789")
    const KEY: &str = "aHVibGluay1kZXZpY2Utc2VjcmV0LTAxMjM0NTY3ODk=";

    #[test]
    fn test_signs_with_decoded_key() {
        let signature = hmac_sha256_base64(
            KEY,
            "myhub.azure-devices.net/devices/dev-01\n1700003600",
        )
        .unwrap();

        assert_eq!(signature, "2aN3mrqORPa3iBHl9+W2BSOPcLU6w2x20fflTe+lmYA=");
    }

    #[test]
    fn test_signature_depends_on_data() {
        let first = hmac_sha256_base64(KEY, "a").unwrap();
        let second = hmac_sha256_base64(KEY, "b").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_rejects_key_that_is_not_base64() {
        let result = hmac_sha256_base64("not base64!", "data");
        assert!(matches!(result, Err(SigningError::InvalidBase64(_))));
    }
}
