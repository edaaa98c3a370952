/// Single-use codes for activation, password reset and email confirmation links
///
/// Codes are drawn from the URL-safe base64 alphabet so they can be embedded
/// in links without escaping.

use rand::Rng;

const URL_SAFE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Generates a URL-safe random code of `length` characters
pub fn generate_url_safe_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..URL_SAFE_CHARSET.len());
            URL_SAFE_CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_length() {
        assert_eq!(generate_url_safe_code(100).len(), 100);
        assert!(generate_url_safe_code(0).is_empty());
    }

    #[test]
    fn test_code_is_url_safe() {
        let code = generate_url_safe_code(500);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_codes_are_unique() {
        assert_ne!(generate_url_safe_code(32), generate_url_safe_code(32));
    }
}
