use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of a generated channel (admin) secret.
pub const CHANNEL_SECRET_LEN: usize = 32;

/// Length of a generated member secret. Kept within the range the API accepts
/// when a member presents it back on re-claim.
pub const MEMBER_SECRET_LEN: usize = 24;

/// Generate a random channel secret.
pub fn channel_secret() -> String {
    generate(CHANNEL_SECRET_LEN)
}

/// Generate a random member secret.
pub fn member_secret() -> String {
    generate(MEMBER_SECRET_LEN)
}

fn generate(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
