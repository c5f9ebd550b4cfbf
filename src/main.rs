fn main() {
    if let Err(e) = udpmirror::run() {
        eprintln!("udpmirror: {e:#}");
        std::process::exit(1);
    }
}
