use chrono::Utc;
use uuid::Uuid;

/// Length of the random suffix on minted identifiers.
const SUFFIX_LEN: usize = 7;

const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Mint a collision-resistant identifier: `{prefix}_{millis}_{suffix}`.
///
/// The suffix is 7 base36 characters drawn from a fresh UUIDv4, which keeps
/// ids unique in practice within one device's lifetime without any central
/// counter. This is best-effort, not a cryptographic guarantee.
pub fn mint(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = base36_suffix(Uuid::new_v4().as_u128(), SUFFIX_LEN);
    format!("{prefix}_{millis}_{suffix}")
}

fn base36_suffix(mut value: u128, len: usize) -> String {
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        out.push(BASE36_ALPHABET[(value % 36) as usize] as char);
        value /= 36;
    }
    out
}
