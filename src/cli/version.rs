//! Version command handler

/// Display version information
pub fn display_version() {
    println!("appcontroller {}", env!("CARGO_PKG_VERSION"));
    println!("  {}", env!("CARGO_PKG_DESCRIPTION"));
    println!("  {}", env!("CARGO_PKG_AUTHORS"));
    println!("  License: {}", env!("CARGO_PKG_LICENSE"));
    println!(
        "  Custom resources: {}/{}",
        crate::cluster::API_GROUP,
        crate::cluster::API_VERSION
    );
}
