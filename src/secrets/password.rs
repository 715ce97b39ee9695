// Generated credential values. Built constructively so the character-class
// guarantees hold without rejection sampling.

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const ALNUM: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const DEFAULT_LENGTH: usize = 32;

fn pick(pool: &[u8]) -> char {
    pool[fastrand::usize(..pool.len())] as char
}

/// Generate an alphanumeric password with at least one lowercase letter, one
/// uppercase letter, and three digits. `with_special` swaps in one literal
/// '.' for password policies that insist on a special character.
pub fn generate(length: usize, with_special: bool) -> String {
    // room for the guaranteed characters
    let length = length.max(if with_special { 6 } else { 5 });

    let mut chars = vec![pick(LOWER), pick(UPPER), pick(DIGITS), pick(DIGITS), pick(DIGITS)];
    if with_special {
        chars.push('.');
    }
    while chars.len() < length {
        chars.push(pick(ALNUM));
    }

    fastrand::shuffle(&mut chars);
    chars.into_iter().collect()
}

/// The default shape used for routed credentials.
pub fn generate_default() -> String {
    generate(DEFAULT_LENGTH, false)
}
