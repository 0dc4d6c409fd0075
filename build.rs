//! Build script for gcgate.
//!
//! Emits feature notes and checks that the `nightly` feature is built with
//! a nightly compiler.

use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DEBUG");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_PARKING_LOT");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_NIGHTLY");

    let debug_enabled = env::var("CARGO_FEATURE_DEBUG").is_ok();
    let nightly_enabled = env::var("CARGO_FEATURE_NIGHTLY").is_ok();

    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let is_release = profile == "release";

    // --- Debug Features ---
    if debug_enabled && is_release {
        emit_warning("Debug features enabled in release build!");
        emit_note("Freed and finalized blocks are poisoned with 0xCD and every");
        emit_note("uncollectable allocation captures a backtrace.");
    }

    // --- Nightly Features ---
    if nightly_enabled {
        check_nightly_compiler();
    }
}

fn emit_note(msg: &str) {
    println!("cargo:warning=[gcgate]    {}", msg);
}

fn emit_warning(msg: &str) {
    println!("cargo:warning=[gcgate] {}", msg);
}

fn check_nightly_compiler() {
    let Ok(rustc) = env::var("RUSTC") else {
        return;
    };
    if let Ok(output) = std::process::Command::new(&rustc).arg("--version").output() {
        let version = String::from_utf8_lossy(&output.stdout);
        if !version.contains("nightly") {
            emit_warning("'nightly' feature enabled but compiler doesn't appear to be nightly!");
            emit_note("UncollectableAllocator needs the unstable allocator_api.");
            emit_note("Use nightly: rustup override set nightly");
        }
    }
}
