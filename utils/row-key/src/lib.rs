use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of every generated row key.
pub const ROW_KEY_LEN: usize = 12;

/// Generate an opaque row key for a new store entry.
///
/// Keys are [`ROW_KEY_LEN`] ASCII alphanumeric characters drawn from the
/// thread-local RNG. At 62^12 possible values collisions are not a concern for
/// the volume of deployments a single partition sees.
pub fn generate_row_key() -> String {
    generate_row_key_with(&mut rand::rng())
}

/// Same as [`generate_row_key`] but with a caller-provided RNG.
pub fn generate_row_key_with<R: Rng>(rng: &mut R) -> String {
    (0..ROW_KEY_LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}
