fn main() {
    if let Err(e) = study_pal_lib::run() {
        eprintln!("study-pal: {e}");
        std::process::exit(1);
    }
}
