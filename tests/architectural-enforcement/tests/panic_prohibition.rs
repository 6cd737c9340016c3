//! Integration Test: Panic Prohibition
//!
//! **Policy**: The sequencer must never block the host, so production code
//! MUST NOT `unwrap()` or `expect()`. Anomalies degrade to completion or
//! surface as `Result` at the configuration boundary.
//! **Allowed**: Test modules (`#[cfg(test)]`), which are not scanned.

use architectural_enforcement::{find_violations, report};

#[test]
fn test_no_unwrap_or_expect_in_production_code() {
    let violations = find_violations(|code| code.contains(".unwrap()") || code.contains(".expect("));

    report(
        &violations,
        "CRITICAL: unwrap()/expect() found in production code!",
        &[
            "Propagate with `?` (config loading, shell main)",
            "Degrade to a safe state (controller, ambient timers)",
            "`unwrap_or` / `unwrap_or_else` / `let ... else` with a fallback",
        ],
    );
}

#[test]
fn test_no_panic_macros_in_production_code() {
    let violations = find_violations(|code| {
        code.contains("panic!(") || code.contains("unreachable!(") || code.contains("todo!(")
    });

    report(
        &violations,
        "CRITICAL: panicking macro found in production code!",
        &["Return an error or degrade to a safe state"],
    );
}
