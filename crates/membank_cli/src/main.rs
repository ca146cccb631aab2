//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `membank_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    println!("membank_core ping={}", membank_core::ping());
    println!("membank_core version={}", membank_core::core_version());
    println!(
        "membank_core default_log_level={}",
        membank_core::default_log_level()
    );
}
