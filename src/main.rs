fn main() {
    if let Err(err) = rectilinear_router::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
