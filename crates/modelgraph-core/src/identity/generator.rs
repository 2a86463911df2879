use std::sync::{LazyLock, Mutex, PoisonError};
use ulid::{Generator, Ulid};

///
/// GENERATOR is lazily initiated with a Mutex
/// it keeps the previous value so ids stay ordered within a millisecond
///

static GENERATOR: LazyLock<Mutex<Generator>> = LazyLock::new(|| Mutex::new(Generator::new()));

/// Generate a ULID string (26 chars, Crockford base32) from the global
/// monotonic generator.
#[must_use]
pub fn generate() -> String {
    let mut generator = GENERATOR.lock().unwrap_or_else(PoisonError::into_inner);

    // overflow only happens after 2^80 ids in one millisecond
    generator
        .generate()
        .unwrap_or_else(|_| Ulid::new())
        .to_string()
}

///
/// TESTS
///
