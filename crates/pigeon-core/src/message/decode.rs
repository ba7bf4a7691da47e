//! Per-content-type body decoding.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use prost::Message as _;

use crate::constant;
use crate::error::{Error, Result};
use crate::protocol::{MsgData, TipsComm};

use super::Message;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Decodes message bodies into typed element fields.
///
/// Decoder errors are per-message and non-fatal: the pipeline skips the
/// offending message and keeps going. Unknown content types are left untyped
/// but still stored.
pub struct ContentDecoder {
    login_user_id: String,
    encryption_key: Option<String>,
}

impl ContentDecoder {
    pub fn new(login_user_id: impl Into<String>, encryption_key: Option<String>) -> Self {
        Self {
            login_user_id: login_user_id.into(),
            encryption_key,
        }
    }

    /// Populate the typed fields of `msg` from the wire body.
    ///
    /// The attached-info blob is always deserialized first; a malformed blob
    /// reads as empty rather than failing the message.
    pub fn decode(&self, wire: &MsgData, msg: &mut Message) -> Result<()> {
        msg.attached_info_elem = serde_json::from_str(&msg.attached_info).unwrap_or_default();

        if constant::is_notification(msg.content_type) {
            let tips = TipsComm::decode(wire.content.as_slice())?;
            msg.notification_elem = Some(super::NotificationElem {
                detail: tips.json_detail,
                default_tips: tips.default_tips,
            });
            return Ok(());
        }

        match msg.content_type {
            constant::TEXT => self.decrypt_text(wire, msg)?,
            constant::PICTURE => msg.picture_elem = Some(parse(&msg.content)?),
            constant::VOICE => msg.sound_elem = Some(parse(&msg.content)?),
            constant::VIDEO => msg.video_elem = Some(parse(&msg.content)?),
            constant::FILE => msg.file_elem = Some(parse(&msg.content)?),
            constant::ADVANCED_TEXT => msg.message_entity_elem = Some(parse(&msg.content)?),
            constant::AT_TEXT => {
                let mut at: super::AtElem = parse(&msg.content)?;
                if at.at_user_list.iter().any(|u| u == &self.login_user_id) {
                    at.is_at_self = true;
                }
                msg.at_elem = Some(at);
            }
            constant::LOCATION => msg.location_elem = Some(parse(&msg.content)?),
            constant::CUSTOM
            | constant::CUSTOM_MSG_NOT_TRIGGER_CONVERSATION
            | constant::CUSTOM_MSG_ONLINE_ONLY => msg.custom_elem = Some(parse(&msg.content)?),
            constant::QUOTE => msg.quote_elem = Some(parse(&msg.content)?),
            constant::MERGER => msg.merge_elem = Some(parse(&msg.content)?),
            constant::FACE => msg.face_elem = Some(parse(&msg.content)?),
            _ => {}
        }
        Ok(())
    }

    /// Decrypt an encrypted plain-text body in place.
    ///
    /// Runs only when the attached info flags the body as encrypted and still
    /// in encrypted form, and an SDK-wide key is configured. Clears
    /// `in_encrypt_status` on success.
    fn decrypt_text(&self, wire: &MsgData, msg: &mut Message) -> Result<()> {
        let key = match &self.encryption_key {
            Some(k) if msg.attached_info_elem.is_encryption
                && msg.attached_info_elem.in_encrypt_status =>
            {
                k.clone()
            }
            _ => return Ok(()),
        };
        // ciphertext is not text; always work from the wire bytes
        let plaintext = aes_cbc_decrypt(&wire.content, key.as_bytes())?;
        msg.content = String::from_utf8(plaintext)
            .map_err(|e| Error::Decode(format!("decrypted text is not utf-8: {}", e)))?;
        msg.attached_info_elem.in_encrypt_status = false;
        msg.sync_attached_info()?;
        Ok(())
    }
}

fn parse<T: serde::de::DeserializeOwned>(content: &str) -> Result<T> {
    serde_json::from_str(content).map_err(|e| Error::Decode(e.to_string()))
}

/// AES-CBC with PKCS7 padding; the IV is the leading cipher block of the key.
pub(crate) fn aes_cbc_decrypt(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if key.len() < 16 {
        return Err(Error::Decode("encryption key shorter than one block".to_string()));
    }
    let iv = &key[..16];
    let out = match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .map_err(|e| Error::Decode(e.to_string()))?
            .decrypt_padded_vec_mut::<Pkcs7>(data),
        24 => Aes192CbcDec::new_from_slices(key, iv)
            .map_err(|e| Error::Decode(e.to_string()))?
            .decrypt_padded_vec_mut::<Pkcs7>(data),
        32 => Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|e| Error::Decode(e.to_string()))?
            .decrypt_padded_vec_mut::<Pkcs7>(data),
        n => {
            return Err(Error::Decode(format!("unsupported key length: {}", n)));
        }
    };
    out.map_err(|e| Error::Decode(format!("bad padding: {}", e)))
}
