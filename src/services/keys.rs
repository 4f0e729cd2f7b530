//! Object key allocation.

use chrono::Utc;
use rand::Rng;

/// Produces collision-resistant, sharded object keys.
///
/// Keys have the shape `{hex4}/{hex4}/{hex4}-{unix_millis}`: three
/// independently drawn 4-hex-digit segments (16 bits each, ~2^48 space)
/// with a millisecond timestamp as tie-breaker. The random prefix spreads
/// keys across backend partitions; no coordination round-trip is paid for
/// a uniqueness guarantee beyond the probabilistic one.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyGenerator;

fn random_hex4() -> String {
    format!("{:04x}", rand::rng().random_range(0u32..0x1_0000))
}

impl KeyGenerator {
    pub fn allocate(&self) -> String {
        format!(
            "{}/{}/{}-{}",
            random_hex4(),
            random_hex4(),
            random_hex4(),
            Utc::now().timestamp_millis()
        )
    }
}
