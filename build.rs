use std::env;
use std::path::PathBuf;

fn main() {
    // Only regenerate the header when the FFI source changes.
    println!("cargo:rerun-if-changed=src/ffi.rs");
    println!("cargo:rerun-if-changed=cbindgen.toml");

    let Ok(crate_dir) = env::var("CARGO_MANIFEST_DIR") else {
        println!("cargo:warning=CARGO_MANIFEST_DIR not set; skipping C header");
        return;
    };
    let crate_dir = PathBuf::from(crate_dir);
    let output_file = crate_dir.join("include").join("ebook_forge.h");

    if let Err(e) = std::fs::create_dir_all(crate_dir.join("include")) {
        println!("cargo:warning=cannot create include/: {e}");
        return;
    }

    let config = match cbindgen::Config::from_file(crate_dir.join("cbindgen.toml")) {
        Ok(config) => config,
        Err(e) => {
            println!("cargo:warning=cbindgen.toml unreadable ({e}); using defaults");
            cbindgen::Config::default()
        }
    };

    // A header failure must not break the library build.
    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(&output_file);
        }
        Err(e) => println!("cargo:warning=C header not generated: {e}"),
    }
}
