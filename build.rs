//! Build script for asset-downloader.
//!
//! Sets `ASSETDL_BUILD_DATE` so the `version` command can report when the
//! binary was built.

fn main() {
    let date = chrono::Utc::now().format("%Y-%m-%d");
    println!("cargo:rustc-env=ASSETDL_BUILD_DATE={date}");
    println!("cargo:rerun-if-changed=build.rs");
}
