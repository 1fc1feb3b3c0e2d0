use clap::Parser;
use uilens_cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
