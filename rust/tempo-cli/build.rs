//! Links an externally generated `tempo_entry` object into `tempo-host` and
//! `tempo-conformance` when the `linked-entry` feature is enabled.

use std::path::Path;

const OBJECT_ENV: &str = "TEMPO_ENTRY_OBJECT";
const VARIANT_ENV: &str = "TEMPO_ENTRY_VARIANT";
const VARIANTS: [&str; 4] = ["int_to_int", "str_to_str", "str_to_int", "int_arithmetic"];
const LINKED_BINS: [&str; 2] = ["tempo-host", "tempo-conformance"];

fn main() {
    println!("cargo:rerun-if-env-changed={OBJECT_ENV}");
    println!("cargo:rerun-if-env-changed={VARIANT_ENV}");
    if std::env::var_os("CARGO_FEATURE_LINKED_ENTRY").is_none() {
        return;
    }

    let Some(object) = std::env::var_os(OBJECT_ENV) else {
        panic!("the linked-entry feature needs {OBJECT_ENV} set to a tempo_entry object file");
    };
    let object = Path::new(&object);
    if !object.is_file() {
        panic!("{OBJECT_ENV}={} is not a file", object.display());
    }

    let variant = std::env::var(VARIANT_ENV).unwrap_or_else(|_| "int_to_int".to_string());
    if !VARIANTS.contains(&variant.as_str()) {
        panic!("{VARIANT_ENV}={variant} is not one of {}", VARIANTS.join(", "));
    }

    println!("cargo:rerun-if-changed={}", object.display());
    println!("cargo:rustc-env=TEMPO_LINKED_VARIANT={variant}");
    for bin in LINKED_BINS {
        println!("cargo:rustc-link-arg-bin={bin}={}", object.display());
    }
}
