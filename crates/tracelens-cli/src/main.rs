use clap::Parser;

mod cli;
pub mod exit_codes;
mod logging;

use cli::args::Cli;
use cli::commands::dispatch;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            let code = exit_codes::for_error(&e);
            tracing::error!(
                kind = exit_codes::failure_kind(&e),
                exit_code = code,
                error = %format!("{e:#}"),
                "command failed"
            );
            eprintln!("fatal: {e:#}");
            code
        }
    };
    std::process::exit(code);
}
