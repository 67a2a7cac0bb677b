use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let target = env::var("TARGET").unwrap_or_default();
    if !target.contains("avr") {
        // Host builds run the simulator-backed test suite only.
        return;
    }

    // Configure for ATmega32A
    println!("cargo:rustc-link-arg=-mmcu=atmega32a");

    if env::var("PROFILE").map(|p| p == "debug").unwrap_or(false) {
        println!("cargo:warning=Building for ATmega32A at 8MHz (debug profile)");
    }
}
