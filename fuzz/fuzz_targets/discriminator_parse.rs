//! Fuzz harness for `Discriminator::parse`.
//!
//! Arbitrary bytes are converted to UTF-8 strings and fed to the parser,
//! checking that it never panics and accepts exactly the single non-NUL
//! ASCII characters.

#![no_main]
use clsem_core::Discriminator;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(id) = std::str::from_utf8(data) else {
        return;
    };
    let parsed = Discriminator::parse(id);
    let single_ascii = id.len() == 1 && id.as_bytes()[0] != 0;
    assert_eq!(parsed.is_ok(), single_ascii, "input {id:?}");
    if let Ok(disc) = parsed {
        assert_eq!(disc.to_string(), id);
    }
});
