//! Sealing of account passwords read from import files.
//!
//! Cleartext passwords become Argon2id PHC strings before a directory sees
//! them. Rows that already carry a stored hash pass through untouched.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::import::row::Password;

/// Bring an import password into stored form.
pub fn seal(password: Password) -> Result<Password, password_hash::Error> {
    let plain = match password {
        Password::Plain(plain) => plain,
        stored @ Password::Hashed(_) => return Ok(stored),
    };
    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default().hash_password(plain.as_bytes(), &salt)?;
    Ok(Password::Hashed(phc.to_string()))
}

/// Whether `plain` opens a sealed password. Hashes in a foreign scheme
/// (`{SHA512}...` and the like) never match.
pub fn opens(sealed: &str, plain: &str) -> bool {
    PasswordHash::new(sealed).is_ok_and(|phc| {
        Argon2::default()
            .verify_password(plain.as_bytes(), &phc)
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn sealed(plain: &str) -> String {
        match seal(Password::Plain(plain.into())).unwrap() {
            Password::Hashed(hash) => hash,
            Password::Plain(_) => panic!("expected a hashed password"),
        }
    }

    #[test]
    fn plain_passwords_become_argon2id() {
        let hash = sealed("toto");
        assert!(hash.starts_with("$argon2id$"));
        assert!(opens(&hash, "toto"));
        assert!(!opens(&hash, "titi"));
    }

    #[test]
    fn same_password_gets_a_fresh_salt() {
        assert_ne!(sealed("toto"), sealed("toto"));
    }

    #[test]
    fn stored_hashes_pass_through() {
        let kept = seal(Password::Hashed("{SHA512}abc".into())).unwrap();
        assert_matches!(kept, Password::Hashed(ref h) if h == "{SHA512}abc");
        assert!(!opens("{SHA512}abc", "abc"));
    }
}
