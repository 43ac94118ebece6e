use clap::Parser;

fn main() {
    let cli = roamctl::Cli::parse();
    roamctl::init_tracing(cli.verbose);
    if let Err(err) = roamctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
