use clap::Parser;
use flyfoto_cli::Flyfoto;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Flyfoto::parse();
    match args.run(true).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::FAILURE
        }
    }
}
