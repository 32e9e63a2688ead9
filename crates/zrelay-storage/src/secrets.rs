use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

/// An encrypted credential as stored at rest: base64 ciphertext (with
/// the AEAD tag appended) plus the base64 IV drawn for that encryption.
#[derive(Debug, Clone)]
pub struct EncryptedSecret {
    pub ciphertext: String,
    pub iv: String,
}

/// AES-256-GCM cipher for credentials kept in the config and group
/// tables. The key is the SHA-256 digest of an application secret, so
/// the literal secret never acts as key material directly.
pub struct SecretCipher {
    key_bytes: [u8; 32],
}

impl SecretCipher {
    pub fn from_secret(app_secret: &str) -> Self {
        let digest = Sha256::digest(app_secret.as_bytes());
        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(&digest);
        Self { key_bytes }
    }

    /// Encrypts a plaintext credential, drawing a fresh random IV.
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedSecret> {
        let unbound_key = UnboundKey::new(&AES_256_GCM, &self.key_bytes)
            .map_err(|_| anyhow::anyhow!("Invalid encryption key"))?;
        let key = LessSafeKey::new(unbound_key);

        let rng = SystemRandom::new();
        let mut iv_bytes = [0u8; NONCE_LEN];
        rng.fill(&mut iv_bytes)
            .map_err(|_| anyhow::anyhow!("Failed to generate IV"))?;
        let nonce = Nonce::assume_unique_for_key(iv_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| anyhow::anyhow!("Encryption failed"))?;

        Ok(EncryptedSecret {
            ciphertext: general_purpose::STANDARD.encode(&in_out),
            iv: general_purpose::STANDARD.encode(iv_bytes),
        })
    }

    /// Decrypts a stored credential. Any failure (bad base64, truncated
    /// data, wrong key, tag mismatch) yields `None` so callers treat
    /// absent and corrupt credentials the same way.
    pub fn decrypt(&self, ciphertext: &str, iv: &str) -> Option<String> {
        let data = general_purpose::STANDARD.decode(ciphertext).ok()?;
        let iv_bytes = general_purpose::STANDARD.decode(iv).ok()?;
        if iv_bytes.len() != NONCE_LEN || data.len() < AES_256_GCM.tag_len() {
            return None;
        }

        let unbound_key = UnboundKey::new(&AES_256_GCM, &self.key_bytes).ok()?;
        let key = LessSafeKey::new(unbound_key);
        let nonce = Nonce::try_assume_unique_for_key(&iv_bytes).ok()?;

        let mut in_out = data;
        let plaintext = key.open_in_place(nonce, Aad::empty(), &mut in_out).ok()?;
        String::from_utf8(plaintext.to_vec()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let cipher = SecretCipher::from_secret("app-secret");
        let secret = cipher.encrypt("zabbix-api-token").unwrap();

        assert_ne!(secret.ciphertext, "zabbix-api-token");
        assert_eq!(
            cipher.decrypt(&secret.ciphertext, &secret.iv).as_deref(),
            Some("zabbix-api-token")
        );
    }

    #[test]
    fn fresh_iv_per_encryption() {
        let cipher = SecretCipher::from_secret("app-secret");
        let a = cipher.encrypt("same-plaintext").unwrap();
        let b = cipher.encrypt("same-plaintext").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn corrupt_ciphertext_decrypts_to_none() {
        let cipher = SecretCipher::from_secret("app-secret");
        let secret = cipher.encrypt("password").unwrap();

        assert!(cipher.decrypt("%%% not base64 %%%", &secret.iv).is_none());
        assert!(cipher.decrypt("dG9vc2hvcnQ=", &secret.iv).is_none());

        let mut tampered = general_purpose::STANDARD.decode(&secret.ciphertext).unwrap();
        tampered[0] ^= 0xff;
        let tampered = general_purpose::STANDARD.encode(&tampered);
        assert!(cipher.decrypt(&tampered, &secret.iv).is_none());
    }

    #[test]
    fn wrong_key_decrypts_to_none() {
        let cipher = SecretCipher::from_secret("app-secret");
        let other = SecretCipher::from_secret("different-secret");
        let secret = cipher.encrypt("password").unwrap();
        assert!(other.decrypt(&secret.ciphertext, &secret.iv).is_none());
    }
}
