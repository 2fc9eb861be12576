use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};

use super::password::CredentialHasher;

const TOKEN_BYTES: usize = 32;

/// A freshly issued token and the digest that gets persisted in its place.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub digest: String,
}

/// Random, URL-safe, 256-bit token. Handed out once, never stored verbatim.
pub fn new_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

pub fn issue(hasher: &CredentialHasher) -> anyhow::Result<IssuedToken> {
    let token = new_token();
    let digest = hasher.hash(&token)?;
    Ok(IssuedToken { token, digest })
}
