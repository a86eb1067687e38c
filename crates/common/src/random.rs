//! Opaque random tokens

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;

/// `len` bytes from the thread-local CSPRNG, encoded as URL-safe base64
/// without padding.
///
/// Panics if the OS entropy source fails; callers have no fallback for that.
pub fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill(bytes.as_mut_slice());
    URL_SAFE_NO_PAD.encode(bytes)
}
