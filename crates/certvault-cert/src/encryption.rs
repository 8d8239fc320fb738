//! RFC 1421 style PEM block encryption.
//!
//! Blocks carry `Proc-Type: 4,ENCRYPTED` and `DEK-Info: <cipher>,<iv>`
//! headers. The symmetric key is derived from the passphrase the way OpenSSL
//! does it (`EVP_BytesToKey` with MD5, one round, salted with the first eight
//! IV bytes), so blocks written here can be read by OpenSSL and vice versa.
//! The IV is one cipher block long: 16 bytes for AES, 8 for DES.

use ::pem::Pem;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use certvault_core::error::CertificateError;
use md5::{Digest, Md5};
use rand::RngCore;

const PROC_TYPE_HEADER: &str = "Proc-Type";
const DEK_INFO_HEADER: &str = "DEK-Info";
const PROC_TYPE_ENCRYPTED: &str = "4,ENCRYPTED";

const SALT_LEN: usize = 8;

/// Block ciphers accepted in a `DEK-Info` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PemCipher {
    DesCbc,
    TdesEde3Cbc,
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
}

impl PemCipher {
    /// Name as written in the `DEK-Info` header.
    pub fn name(self) -> &'static str {
        match self {
            PemCipher::DesCbc => "DES-CBC",
            PemCipher::TdesEde3Cbc => "DES-EDE3-CBC",
            PemCipher::Aes128Cbc => "AES-128-CBC",
            PemCipher::Aes192Cbc => "AES-192-CBC",
            PemCipher::Aes256Cbc => "AES-256-CBC",
        }
    }

    /// Looks up a cipher by its `DEK-Info` name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "DES-CBC" => Some(PemCipher::DesCbc),
            "DES-EDE3-CBC" => Some(PemCipher::TdesEde3Cbc),
            "AES-128-CBC" => Some(PemCipher::Aes128Cbc),
            "AES-192-CBC" => Some(PemCipher::Aes192Cbc),
            "AES-256-CBC" => Some(PemCipher::Aes256Cbc),
            _ => None,
        }
    }

    fn key_len(self) -> usize {
        match self {
            PemCipher::DesCbc => 8,
            PemCipher::TdesEde3Cbc => 24,
            PemCipher::Aes128Cbc => 16,
            PemCipher::Aes192Cbc => 24,
            PemCipher::Aes256Cbc => 32,
        }
    }

    /// Cipher block size, which is also the IV length.
    fn block_len(self) -> usize {
        match self {
            PemCipher::DesCbc | PemCipher::TdesEde3Cbc => 8,
            PemCipher::Aes128Cbc | PemCipher::Aes192Cbc | PemCipher::Aes256Cbc => 16,
        }
    }

    fn encrypt(self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, String> {
        let ciphertext = match self {
            PemCipher::DesCbc => cbc::Encryptor::<des::Des>::new_from_slices(key, iv)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(data)),
            PemCipher::TdesEde3Cbc => cbc::Encryptor::<des::TdesEde3>::new_from_slices(key, iv)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(data)),
            PemCipher::Aes128Cbc => cbc::Encryptor::<aes::Aes128>::new_from_slices(key, iv)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(data)),
            PemCipher::Aes192Cbc => cbc::Encryptor::<aes::Aes192>::new_from_slices(key, iv)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(data)),
            PemCipher::Aes256Cbc => cbc::Encryptor::<aes::Aes256>::new_from_slices(key, iv)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(data)),
        };

        ciphertext.map_err(|e| e.to_string())
    }

    fn decrypt(self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, String> {
        let plaintext = match self {
            PemCipher::DesCbc => cbc::Decryptor::<des::Des>::new_from_slices(key, iv)
                .map_err(|e| e.to_string())?
                .decrypt_padded_vec_mut::<Pkcs7>(data),
            PemCipher::TdesEde3Cbc => cbc::Decryptor::<des::TdesEde3>::new_from_slices(key, iv)
                .map_err(|e| e.to_string())?
                .decrypt_padded_vec_mut::<Pkcs7>(data),
            PemCipher::Aes128Cbc => cbc::Decryptor::<aes::Aes128>::new_from_slices(key, iv)
                .map_err(|e| e.to_string())?
                .decrypt_padded_vec_mut::<Pkcs7>(data),
            PemCipher::Aes192Cbc => cbc::Decryptor::<aes::Aes192>::new_from_slices(key, iv)
                .map_err(|e| e.to_string())?
                .decrypt_padded_vec_mut::<Pkcs7>(data),
            PemCipher::Aes256Cbc => cbc::Decryptor::<aes::Aes256>::new_from_slices(key, iv)
                .map_err(|e| e.to_string())?
                .decrypt_padded_vec_mut::<Pkcs7>(data),
        };

        // A bad padding almost always means a wrong passphrase
        plaintext.map_err(|_| "invalid padding, wrong passphrase?".to_string())
    }
}

/// OpenSSL `EVP_BytesToKey` with MD5 and a single iteration.
fn derive_key(passphrase: &[u8], salt: &[u8], key_len: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(key_len);
    let mut digest: Vec<u8> = Vec::new();

    while key.len() < key_len {
        let mut hasher = Md5::new();
        hasher.update(&digest);
        hasher.update(passphrase);
        hasher.update(salt);
        digest = hasher.finalize().to_vec();

        let take = (key_len - key.len()).min(digest.len());
        key.extend_from_slice(&digest[..take]);
    }

    key
}

/// Returns true if the block carries a `DEK-Info` header.
pub fn is_legacy_encrypted(block: &Pem) -> bool {
    block.headers().get(DEK_INFO_HEADER).is_some()
}

/// Decrypts the contents of a legacy encrypted block.
///
/// The error string describes what went wrong; callers attach the block
/// position.
pub fn decrypt_legacy(block: &Pem, passphrase: &[u8]) -> Result<Vec<u8>, String> {
    let dek_info = block
        .headers()
        .get(DEK_INFO_HEADER)
        .ok_or_else(|| "missing DEK-Info header".to_string())?;

    let (cipher_name, iv_hex) = dek_info
        .split_once(',')
        .ok_or_else(|| format!("malformed DEK-Info header: {}", dek_info))?;

    let cipher = PemCipher::from_name(cipher_name.trim())
        .ok_or_else(|| format!("unsupported cipher: {}", cipher_name.trim()))?;

    let iv = hex::decode(iv_hex.trim()).map_err(|e| format!("invalid IV: {}", e))?;
    if iv.len() != cipher.block_len() {
        return Err(format!("invalid IV length: {}", iv.len()));
    }

    let contents = block.contents();
    if contents.is_empty() || contents.len() % cipher.block_len() != 0 {
        return Err("ciphertext is not a multiple of the block size".to_string());
    }

    let key = derive_key(passphrase, &iv[..SALT_LEN], cipher.key_len());
    cipher.decrypt(&key, &iv, contents)
}

/// Encrypts `der` into a new block labelled `label`, using a fresh random IV
/// on every call.
pub fn encrypt_block(
    label: &str,
    der: &[u8],
    passphrase: &[u8],
    cipher: PemCipher,
) -> Result<Pem, CertificateError> {
    let mut iv = vec![0u8; cipher.block_len()];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let key = derive_key(passphrase, &iv[..SALT_LEN], cipher.key_len());
    let ciphertext = cipher
        .encrypt(&key, &iv, der)
        .map_err(CertificateError::encryption)?;

    let mut block = Pem::new(label, ciphertext);
    let dek_info = format!("{},{}", cipher.name(), hex::encode_upper(iv));
    block
        .headers_mut()
        .add(PROC_TYPE_HEADER, PROC_TYPE_ENCRYPTED)
        .map_err(|e| CertificateError::encryption(format!("{:?}", e)))?;
    block
        .headers_mut()
        .add(DEK_INFO_HEADER, &dek_info)
        .map_err(|e| CertificateError::encryption(format!("{:?}", e)))?;

    Ok(block)
}
