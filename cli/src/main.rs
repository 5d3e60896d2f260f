use std::process::exit;

mod cli;

fn main() {
    let args = cli::parse_args();
    if let Err(e) = cli::run(&args) {
        eprintln!("{e:#}");
        exit(1);
    }
}
