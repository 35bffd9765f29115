//! Credential password generation.

use rand::Rng;

/// Default password length handed to a freshly onboarded device.
pub const DEFAULT_PASSWORD_LEN: usize = 20;

/// Mixed alphabet: ASCII letters, digits, and punctuation.
const PASSWORD_POOL: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789\
      !\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Generate a password of `len` chars from the mixed pool.
///
/// `thread_rng` is a CSPRNG, so the result is suitable as a broker
/// credential.
pub fn generate_password(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| PASSWORD_POOL[rng.gen_range(0..PASSWORD_POOL.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length() {
        assert_eq!(generate_password(DEFAULT_PASSWORD_LEN).len(), 20);
        assert_eq!(generate_password(32).len(), 32);
    }

    #[test]
    fn test_password_stays_in_pool() {
        let password = generate_password(200);
        for c in password.bytes() {
            assert!(
                PASSWORD_POOL.contains(&c),
                "unexpected character: {}",
                c as char
            );
        }
    }

    #[test]
    fn test_passwords_differ() {
        assert_ne!(generate_password(20), generate_password(20));
    }
}
