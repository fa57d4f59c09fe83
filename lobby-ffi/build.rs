// Publishes the C header to $OUT_DIR.
//
// With `cbindgen` on PATH the header is regenerated from src/lib.rs and the
// checked-in copy under include/ is refreshed; otherwise the checked-in
// include/lobby.h is copied as is.

use std::{env, fs, path::PathBuf, process::Command};

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=include/lobby.h");

    let (Some(crate_dir), Some(out_dir)) = (env::var_os("CARGO_MANIFEST_DIR"), env::var_os("OUT_DIR")) else {
        println!("cargo:warning=lobby-ffi: cargo did not set the build directories; skipping header");
        return;
    };
    let crate_dir = PathBuf::from(crate_dir);
    let checked_in = crate_dir.join("include").join("lobby.h");
    let generated = PathBuf::from(out_dir).join("lobby.h");

    let regenerated = Command::new("cbindgen")
        .args(["--crate", "lobby-ffi", "--lang", "C", "--output"])
        .arg(&generated)
        .current_dir(&crate_dir)
        .status()
        .map(|s| s.success())
        .unwrap_or(false);

    if regenerated {
        let _ = fs::copy(&generated, &checked_in);
        return;
    }
    if let Err(e) = fs::copy(&checked_in, &generated) {
        println!("cargo:warning=lobby-ffi: no cbindgen and no include/lobby.h ({e})");
    }
}
