//! Generates `include/netkit_ffi.h` for hosts linking the static library.

fn main() {
    let crate_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    println!("cargo:rerun-if-changed=src");

    let config = cbindgen::Config {
        language: cbindgen::Language::C,
        include_guard: Some("NETKIT_FFI_H".to_string()),
        cpp_compat: true,
        ..Default::default()
    };

    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            let _ = std::fs::create_dir_all(format!("{crate_dir}/include"));
            bindings.write_to_file(format!("{crate_dir}/include/netkit_ffi.h"));
        }
        Err(e) => println!("cargo:warning=cbindgen: {e}"),
    }
}
