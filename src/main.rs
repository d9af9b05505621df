fn main() {
    if let Err(err) = sheetdash::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
