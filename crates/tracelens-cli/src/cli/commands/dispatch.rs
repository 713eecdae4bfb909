use super::super::args::*;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let config = cli.config.as_deref();
    match cli.cmd {
        Command::Extract(args) => super::extract::run(args, config).await,
        Command::Analyze(args) => super::analyze::run(args, config).await,
        Command::Run(args) => super::run::run(args, config).await,
    }
}
