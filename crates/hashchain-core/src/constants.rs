pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Largest satisfiable difficulty: every hex digit of the digest is `'0'`.
pub const MAX_DIFFICULTY: u32 = HASH_HEX_SIZE as u32;
pub const GENESIS_PREVIOUS_FINGERPRINT: &str = "0";
pub const GENESIS_PAYLOAD: &str = "Genesis Block";
pub const DEFAULT_DIFFICULTY: u32 = 4;
pub const DEFAULT_CHECK_INTERVAL: u64 = 4096;
