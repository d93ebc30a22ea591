//! `tptctl version`

/// Version of this build
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Print the version
pub fn run() {
    println!("tptctl version {}", VERSION);
}
