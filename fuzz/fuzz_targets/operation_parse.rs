//! Fuzz harness for `Operation::from_str`.
//!
//! Every input either parses or is rejected as a usage error, and every
//! accepted operation prints back to a form that parses to itself.

#![no_main]
use clsem_core::Operation;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(arg) = std::str::from_utf8(data) else {
        return;
    };
    match arg.parse::<Operation>() {
        Ok(op) => {
            let printed = op.to_string();
            assert_eq!(printed.parse::<Operation>().ok(), Some(op), "input {arg:?}");
        },
        Err(err) => assert!(err.is_usage(), "input {arg:?}: {err}"),
    }
});
