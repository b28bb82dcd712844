use std::path::Path;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use zeroize::Zeroize;

use crate::config::PlatformConfig;
use crate::error::AppError;

const MASTER_KEY_BYTES: usize = 32;
const NONCE_BYTES: usize = 12;
pub const KEY_FILE_NAME: &str = "master.key";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedData {
    pub nonce_b64: String,
    pub ciphertext_b64: String,
}

impl EncryptedData {
    pub fn to_compact(&self) -> String {
        format!("{}:{}", self.nonce_b64, self.ciphertext_b64)
    }

    pub fn from_compact(compact: &str) -> Result<Self, AppError> {
        let (nonce_b64, ciphertext_b64) = compact
            .split_once(':')
            .ok_or_else(|| AppError::Crypto("Missing ciphertext component".to_string()))?;

        Ok(Self {
            nonce_b64: nonce_b64.to_string(),
            ciphertext_b64: ciphertext_b64.to_string(),
        })
    }
}

/// AES-256-GCM over the settings secrets. The key is wiped on drop.
#[derive(Clone)]
pub struct CryptoService {
    master_key: [u8; MASTER_KEY_BYTES],
}

impl CryptoService {
    pub fn from_key(key: [u8; MASTER_KEY_BYTES]) -> Self {
        Self { master_key: key }
    }

    pub fn from_base64(encoded: &str) -> Result<Self, AppError> {
        let mut bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
        if bytes.len() != MASTER_KEY_BYTES {
            bytes.zeroize();
            return Err(AppError::Crypto(
                "Master key must be 32 bytes".to_string(),
            ));
        }
        let mut key = [0u8; MASTER_KEY_BYTES];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self::from_key(key))
    }

    /// Reads the key file, generating and writing a fresh key on first use.
    pub async fn from_key_file(path: &Path) -> Result<Self, AppError> {
        match tokio::fs::read_to_string(path).await {
            Ok(mut encoded) => {
                let service = Self::from_base64(&encoded);
                encoded.zeroize();
                service
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                let mut key = [0u8; MASTER_KEY_BYTES];
                OsRng.fill_bytes(&mut key);
                let mut encoded = base64::engine::general_purpose::STANDARD.encode(key);
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let written = tokio::fs::write(path, &encoded).await;
                encoded.zeroize();
                written.map_err(|e| AppError::from(e).context("write master key"))?;
                crate::log_info!("agent_platform.crypto", "Generated master key at {}", path.display());
                Ok(Self::from_key(key))
            }
            Err(error) => Err(AppError::from(error).context("read master key")),
        }
    }

    pub async fn from_config(config: &PlatformConfig) -> Result<Self, AppError> {
        match &config.master_key_b64 {
            Some(encoded) => Self::from_base64(encoded),
            None => Self::from_key_file(&config.data_dir.join(KEY_FILE_NAME)).await,
        }
    }

    fn cipher(&self) -> Result<Aes256Gcm, AppError> {
        Aes256Gcm::new_from_slice(&self.master_key)
            .map_err(|_| AppError::Crypto("Failed to initialize AES-256-GCM cipher".to_string()))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedData, AppError> {
        let cipher = self.cipher()?;

        let mut nonce_raw = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut nonce_raw);
        let nonce = Nonce::from_slice(&nonce_raw);

        let ciphertext = cipher.encrypt(nonce, plaintext)?;
        let nonce_b64 = base64::engine::general_purpose::STANDARD.encode(nonce_raw);
        let ciphertext_b64 = base64::engine::general_purpose::STANDARD.encode(ciphertext);

        Ok(EncryptedData {
            nonce_b64,
            ciphertext_b64,
        })
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<Vec<u8>, AppError> {
        let compact = EncryptedData::from_compact(encrypted)?;
        let nonce_raw = base64::engine::general_purpose::STANDARD.decode(compact.nonce_b64)?;
        if nonce_raw.len() != NONCE_BYTES {
            return Err(AppError::Crypto("Invalid nonce length".to_string()));
        }
        let ciphertext =
            base64::engine::general_purpose::STANDARD.decode(compact.ciphertext_b64)?;

        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(&nonce_raw), ciphertext.as_ref())?;
        Ok(plaintext)
    }

    pub fn encrypt_to_compact(&self, plaintext: &[u8]) -> Result<String, AppError> {
        Ok(self.encrypt(plaintext)?.to_compact())
    }

    pub fn decrypt_string(&self, encrypted: &str) -> Result<String, AppError> {
        let bytes = self.decrypt(encrypted)?;
        String::from_utf8(bytes).map_err(|error| {
            let mut bytes = error.into_bytes();
            bytes.zeroize();
            AppError::Crypto("Decrypted value is not UTF-8".to_string())
        })
    }
}

impl Drop for CryptoService {
    fn drop(&mut self) {
        self.master_key.zeroize();
    }
}
