//! Invitation tokens.

use rand::Rng;

/// Generates an unguessable invitation token.
///
/// 16 random bytes (128 bits) rendered as 32 lowercase hex characters, so
/// the token is safe to drop into a URL path or query string unescaped.
pub fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_generate_token_is_32_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 32);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        );
    }

    #[test]
    fn test_generate_token_does_not_repeat() {
        let tokens: HashSet<_> = (0..1000).map(|_| generate_token()).collect();
        assert_eq!(tokens.len(), 1000);
    }
}
