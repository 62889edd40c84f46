//! Generates `bridge_ffi.h` for C callers into `OUT_DIR`.
//!
//! Header generation is best effort: a cbindgen failure is reported as a
//! cargo warning and the library still builds.

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-changed=cbindgen.toml");

    let (Ok(crate_dir), Ok(out_dir)) = (env::var("CARGO_MANIFEST_DIR"), env::var("OUT_DIR")) else {
        println!("cargo:warning=bridge-ffi: cargo did not set the manifest or out dir");
        return;
    };
    let config = cbindgen::Config::from_file(PathBuf::from(&crate_dir).join("cbindgen.toml"))
        .unwrap_or_default();
    match cbindgen::generate_with_config(&crate_dir, config) {
        Ok(bindings) => {
            bindings.write_to_file(PathBuf::from(out_dir).join("bridge_ffi.h"));
        }
        Err(e) => println!("cargo:warning=bridge-ffi: header not generated: {e}"),
    }
}
