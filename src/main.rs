fn main() {
    if let Err(err) = flatvg::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
