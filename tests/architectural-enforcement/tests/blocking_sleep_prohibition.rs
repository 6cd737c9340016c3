//! Integration Test: Blocking Sleep Prohibition
//!
//! **Policy**: Scene and ambient timing runs on tokio timers. Production code
//! MUST NOT block a thread to wait.
//! **Allowed**: `tokio::time::sleep` / `sleep_until`, which yield to the runtime.

use architectural_enforcement::{find_violations, report};

#[test]
fn test_no_blocking_sleep_in_production_code() {
    let violations = find_violations(|code| {
        code.contains("thread::sleep") || code.contains("std::thread::park_timeout")
    });

    report(
        &violations,
        "CRITICAL: Blocking sleep found in production code!",
        &[
            "tokio::time::sleep(d).await",
            "tokio::time::sleep_until(deadline).await",
        ],
    );
}

#[test]
fn test_no_busy_wait_polling() {
    let violations = find_violations(|code| code.contains("yield_now()") && code.contains("loop"));

    report(
        &violations,
        "CRITICAL: Busy-wait polling found in production code!",
        &["Await a timer, channel, or oneshot instead of spinning"],
    );
}
