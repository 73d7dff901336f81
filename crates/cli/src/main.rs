use std::process::ExitCode;

fn main() -> ExitCode {
    reco_cli::run()
}
