use aes::{Aes128, Aes256};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use serde::{Deserialize, Serialize};

use crate::error::{BlobError, Result};

const AES_BLOCK_SIZE: usize = 16;

/// Cipher used by the story media protocol. Everything that decrypts a blob
/// goes through this constant unless [`crate::ResolveOptions::cipher`]
/// overrides it.
pub const MEDIA_CIPHER: CipherSuite = CipherSuite::Aes256CbcPkcs7;

/// Supported block cipher schemes. One key, one IV, PKCS#7 padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CipherSuite {
    #[default]
    Aes256CbcPkcs7,
    Aes128CbcPkcs7,
}

impl CipherSuite {
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes256CbcPkcs7 => 32,
            Self::Aes128CbcPkcs7 => 16,
        }
    }

    pub const fn iv_len(self) -> usize {
        AES_BLOCK_SIZE
    }

    pub const fn block_size(self) -> usize {
        AES_BLOCK_SIZE
    }

    fn check_inputs(self, data_len: usize, key: &[u8], iv: &[u8]) -> Result<()> {
        if key.len() != self.key_len() {
            return Err(BlobError::Decryption(format!(
                "invalid key length: expected {}, got {}",
                self.key_len(),
                key.len()
            )));
        }
        if iv.len() != self.iv_len() {
            return Err(BlobError::Decryption(format!(
                "invalid IV length: expected {}, got {}",
                self.iv_len(),
                iv.len()
            )));
        }
        if data_len == 0 || data_len % self.block_size() != 0 {
            return Err(BlobError::Decryption(format!(
                "ciphertext length {} is not a positive multiple of {}",
                data_len,
                self.block_size()
            )));
        }
        Ok(())
    }

    /// Decrypt `ciphertext` as a whole. Either the full plaintext is returned
    /// or an error; partially decrypted data never escapes.
    pub fn decrypt(self, ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        self.check_inputs(ciphertext.len(), key, iv)?;

        let plaintext = match self {
            Self::Aes256CbcPkcs7 => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
                .map_err(|e| BlobError::Decryption(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            Self::Aes128CbcPkcs7 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
                .map_err(|e| BlobError::Decryption(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        };

        plaintext.map_err(|_| BlobError::Decryption("invalid padding".to_string()))
    }

    #[cfg(test)]
    pub(crate) fn encrypt(self, plaintext: &[u8], key: &[u8], iv: &[u8]) -> Vec<u8> {
        use cbc::cipher::BlockEncryptMut;

        match self {
            Self::Aes256CbcPkcs7 => cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
                .unwrap()
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            Self::Aes128CbcPkcs7 => cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
                .unwrap()
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        }
    }
}

/// The decryption step the resolver calls for presumed ciphertext.
pub trait MediaDecrypter {
    fn decrypt(&self, ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>>;
}

impl MediaDecrypter for CipherSuite {
    fn decrypt(&self, ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        CipherSuite::decrypt(*self, ciphertext, key, iv)
    }
}

impl<D: MediaDecrypter + ?Sized> MediaDecrypter for &D {
    fn decrypt(&self, ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        (**self).decrypt(ciphertext, key, iv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [7u8; 32];
    const IV: [u8; 16] = [9u8; 16];

    #[test]
    fn test_roundtrip() {
        for suite in [CipherSuite::Aes256CbcPkcs7, CipherSuite::Aes128CbcPkcs7] {
            let key = &KEY[..suite.key_len()];
            for plaintext in [&b"x"[..], &[0u8; 16][..], &b"a longer plaintext spanning blocks"[..]] {
                let ciphertext = suite.encrypt(plaintext, key, &IV);
                assert_eq!(ciphertext.len() % 16, 0);
                assert_eq!(suite.decrypt(&ciphertext, key, &IV).unwrap(), plaintext);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let ciphertext = MEDIA_CIPHER.encrypt(b"same input", &KEY, &IV);
        let a = MEDIA_CIPHER.decrypt(&ciphertext, &KEY, &IV).unwrap();
        let b = MEDIA_CIPHER.decrypt(&ciphertext, &KEY, &IV).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bad_key_length() {
        let ciphertext = MEDIA_CIPHER.encrypt(b"data", &KEY, &IV);
        let result = MEDIA_CIPHER.decrypt(&ciphertext, &KEY[..31], &IV);
        assert!(matches!(result, Err(BlobError::Decryption(_))));
    }

    #[test]
    fn test_bad_iv_length() {
        let ciphertext = MEDIA_CIPHER.encrypt(b"data", &KEY, &IV);
        let result = MEDIA_CIPHER.decrypt(&ciphertext, &KEY, &IV[..8]);
        assert!(matches!(result, Err(BlobError::Decryption(_))));
    }

    #[test]
    fn test_ragged_ciphertext() {
        let result = MEDIA_CIPHER.decrypt(&[0u8; 17], &KEY, &IV);
        assert!(matches!(result, Err(BlobError::Decryption(_))));
        let result = MEDIA_CIPHER.decrypt(&[], &KEY, &IV);
        assert!(matches!(result, Err(BlobError::Decryption(_))));
    }

    #[test]
    fn test_wrong_key_fails_padding() {
        let ciphertext = MEDIA_CIPHER.encrypt(b"secret story", &KEY, &IV);
        let mut wrong = KEY;
        wrong[0] ^= 0xFF;
        // A wrong key almost always yields invalid PKCS#7 padding; when it does
        // not, the output must at least differ from the plaintext.
        match MEDIA_CIPHER.decrypt(&ciphertext, &wrong, &IV) {
            Err(BlobError::Decryption(_)) => {}
            Ok(plain) => assert_ne!(plain, b"secret story"),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_suite_serde_names() {
        let suite: CipherSuite = serde_json::from_str("\"aes128-cbc-pkcs7\"").unwrap();
        assert_eq!(suite, CipherSuite::Aes128CbcPkcs7);
        assert_eq!(
            serde_json::to_string(&CipherSuite::Aes256CbcPkcs7).unwrap(),
            "\"aes256-cbc-pkcs7\""
        );
    }
}
