//! Channel encryption: AES-256-CBC with PKCS#7 padding and an
//! ECB-encrypted IV prefix.
//!
//! Every message gets a fresh random 16-byte IV. The IV itself is AES
//! encrypted as a single block (ECB, no padding) under the session key and
//! prepended to the CBC ciphertext, which is produced with the *plain* IV.
//! Decryption recovers the IV first, then the payload.

use crate::error::{ProtocolError, Result};
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand_core::{OsRng, RngCore};
use zeroize::Zeroize;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const BLOCK_SIZE: usize = 16;

/// Symmetric cipher bound to a 32-byte session key.
///
/// The key is wiped from memory when the cipher is dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct ChannelCipher {
    key: [u8; 32],
}

impl ChannelCipher {
    pub fn new(key: &[u8; 32]) -> Self {
        Self { key: *key }
    }

    /// Encrypt `src`, returning `iv_enc || ciphertext`.
    ///
    /// Output length is always `16 + (src.len() / 16 + 1) * 16`: one IV
    /// block plus the PKCS#7-padded payload (a full extra block when the
    /// payload is already aligned).
    pub fn encrypt(&self, src: &[u8]) -> Result<Vec<u8>> {
        let mut iv = [0u8; BLOCK_SIZE];
        OsRng.fill_bytes(&mut iv);

        let block = Aes256::new(&self.key.into());
        let mut iv_enc = iv;
        block.encrypt_block((&mut iv_enc).into());

        let ciphertext =
            Aes256CbcEnc::new(&self.key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(src);

        let mut out = Vec::with_capacity(BLOCK_SIZE + ciphertext.len());
        out.extend_from_slice(&iv_enc);
        out.extend_from_slice(&ciphertext);

        iv.zeroize();
        Ok(out)
    }

    /// Decrypt `iv_enc || ciphertext` and strip the padding.
    ///
    /// # Errors
    /// Returns [`ProtocolError::DecryptFailure`] when the input is shorter
    /// than two blocks, not block-aligned, or carries invalid padding.
    pub fn decrypt(&self, src: &[u8]) -> Result<Vec<u8>> {
        if src.len() < 2 * BLOCK_SIZE || (src.len() - BLOCK_SIZE) % BLOCK_SIZE != 0 {
            return Err(ProtocolError::DecryptFailure);
        }

        let block = Aes256::new(&self.key.into());
        let mut iv = [0u8; BLOCK_SIZE];
        iv.copy_from_slice(&src[..BLOCK_SIZE]);
        block.decrypt_block((&mut iv).into());

        let plaintext = Aes256CbcDec::new(&self.key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&src[BLOCK_SIZE..])
            .map_err(|_| ProtocolError::DecryptFailure)?;

        iv.zeroize();
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_roundtrip() {
        let cipher = ChannelCipher::new(&[0u8; 32]);
        let sealed = cipher.encrypt(b"hello").unwrap();
        assert_eq!(sealed.len(), 32);
        assert_eq!(cipher.decrypt(&sealed).unwrap(), b"hello");
    }

    #[test]
    fn test_roundtrip_empty_and_aligned() {
        let cipher = ChannelCipher::new(&[7u8; 32]);

        // Empty payload still gets a full padding block.
        let sealed = cipher.encrypt(b"").unwrap();
        assert_eq!(sealed.len(), 32);
        assert_eq!(cipher.decrypt(&sealed).unwrap(), b"");

        // Block-aligned payload gains a full extra block.
        let aligned = [0xABu8; 32];
        let sealed = cipher.encrypt(&aligned).unwrap();
        assert_eq!(sealed.len(), 16 + 48);
        assert_eq!(cipher.decrypt(&sealed).unwrap(), aligned);
    }

    #[test]
    fn test_fresh_iv_per_message() {
        let cipher = ChannelCipher::new(&[1u8; 32]);
        let a = cipher.encrypt(b"same plaintext").unwrap();
        let b = cipher.encrypt(b"same plaintext").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails_padding() {
        let sealed = ChannelCipher::new(&[2u8; 32]).encrypt(b"secret").unwrap();
        let other = ChannelCipher::new(&[3u8; 32]);
        // Overwhelmingly likely to produce invalid padding.
        assert!(other.decrypt(&sealed).is_err());
    }

    #[test]
    fn test_malformed_input_rejected() {
        let cipher = ChannelCipher::new(&[0u8; 32]);
        assert!(cipher.decrypt(&[]).is_err());
        assert!(cipher.decrypt(&[0u8; 16]).is_err());
        assert!(cipher.decrypt(&[0u8; 33]).is_err());
    }

    #[test]
    fn test_iv_prefix_is_ecb_wrapped() {
        // Decrypting the first block with the raw key must yield the IV the
        // CBC stream was built with; verify by re-encrypting manually.
        let key = [9u8; 32];
        let cipher = ChannelCipher::new(&key);
        let sealed = cipher.encrypt(b"check the iv path").unwrap();

        let block = Aes256::new(&key.into());
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&sealed[..16]);
        block.decrypt_block((&mut iv).into());

        let expected = Aes256CbcEnc::new(&key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(b"check the iv path");
        assert_eq!(&sealed[16..], &expected[..]);
    }
}
