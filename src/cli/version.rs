/// Display version information
pub fn execute() {
    println!("blobsite {}", env!("CARGO_PKG_VERSION"));
    println!("Static site publisher for decentralized blob storage");
}
