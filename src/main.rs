fn main() {
    if let Err(err) = sheet_merge::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
