//! Password encodings per directory implementation
//!
//! Each [`Implementation`] maps to one encoder producing the replace
//! modification that sets a new password.

use crate::ldap::types::Modification;
use warden_core::Implementation;

pub type PasswordEncoder = fn(&str) -> Modification;

pub const USER_PASSWORD_ATTRIBUTE: &str = "userPassword";
pub const UNICODE_PWD_ATTRIBUTE: &str = "unicodePwd";

pub fn encoder_for(implementation: Implementation) -> PasswordEncoder {
    match implementation {
        Implementation::Custom => encode_user_password,
        Implementation::ActiveDirectory => encode_unicode_pwd,
    }
}

/// The directory applies its own password hashing on write.
pub fn encode_user_password(password: &str) -> Modification {
    Modification {
        attribute: USER_PASSWORD_ATTRIBUTE.to_string(),
        values: vec![password.as_bytes().to_vec()],
    }
}

/// Active Directory only accepts the password enclosed in double quotes,
/// encoded as UTF-16LE without a byte order mark.
pub fn encode_unicode_pwd(password: &str) -> Modification {
    let quoted = format!("\"{}\"", password);
    let encoded: Vec<u8> = quoted.encode_utf16().flat_map(u16::to_le_bytes).collect();

    Modification {
        attribute: UNICODE_PWD_ATTRIBUTE.to_string(),
        values: vec![encoded],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_utf16le(bytes: &[u8]) -> String {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).unwrap()
    }

    #[test]
    fn test_custom_uses_user_password() {
        let modification = encoder_for(Implementation::Custom)("P@ss1");

        assert_eq!(modification.attribute, "userPassword");
        assert_eq!(modification.values, vec![b"P@ss1".to_vec()]);
    }

    #[test]
    fn test_active_directory_uses_quoted_utf16le() {
        let modification = encoder_for(Implementation::ActiveDirectory)("P@ss1");

        assert_eq!(modification.attribute, "unicodePwd");
        assert_eq!(modification.values.len(), 1);

        let bytes = &modification.values[0];
        assert_eq!(
            bytes.as_slice(),
            &[
                b'"', 0, b'P', 0, b'@', 0, b's', 0, b's', 0, b'1', 0, b'"', 0
            ]
        );
        assert_eq!(decode_utf16le(bytes), "\"P@ss1\"");
    }

    #[test]
    fn test_active_directory_non_ascii_and_no_bom() {
        let modification = encode_unicode_pwd("pässwörd€");
        let bytes = &modification.values[0];

        assert_ne!(&bytes[..2], &[0xFF, 0xFE]);
        assert_eq!(decode_utf16le(bytes), "\"pässwörd€\"");
    }
}
