use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};

/// Opaque single-use reset secret: 32 bytes from the OS RNG, hex-encoded.
/// Carries no relation to the account it will be attached to.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn reset_expiry(ttl_minutes: i64) -> OffsetDateTime {
    OffsetDateTime::now_utc() + Duration::minutes(ttl_minutes)
}
