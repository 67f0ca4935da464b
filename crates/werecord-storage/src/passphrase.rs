use werecord_core::layout::md5_hex;

/// Length of the store passphrase, in hex characters.
pub const PASSPHRASE_LEN: usize = 7;

/// Passphrase of an account's store: the first seven lowercase hex digits of
/// `md5(secret ++ uin)`.
pub fn derive_passphrase(secret: &str, uin: &str) -> String {
    let mut digest = md5_hex(&format!("{secret}{uin}"));
    digest.truncate(PASSPHRASE_LEN);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_vector() {
        assert_eq!(derive_passphrase("1234567890ABCDEF", "12345"), "f125edb");
        assert_eq!(
            derive_passphrase("1234567890ABCDEF", "12345"),
            &md5_hex("1234567890ABCDEF12345")[..7]
        );
    }

    #[test]
    fn always_seven_lowercase_hex_chars() {
        let inputs = [
            ("", ""),
            ("352584061234567", "-1398712345"),
            ("ABCDEF", "0"),
            ("秘密", "42"),
        ];
        for (secret, uin) in inputs {
            let first = derive_passphrase(secret, uin);
            let second = derive_passphrase(secret, uin);
            assert_eq!(first, second, "derivation must be deterministic");
            assert_eq!(first.len(), PASSPHRASE_LEN);
            assert!(first
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }
    }

    #[test]
    fn depends_on_both_inputs() {
        assert_ne!(derive_passphrase("A", "1"), derive_passphrase("A", "2"));
        assert_ne!(derive_passphrase("A", "1"), derive_passphrase("B", "1"));
    }
}
