mod cli;
mod config;
mod query;
mod run;
mod table;

pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let cmd = cli::parse_args(&args)?;
    match cmd {
        cli::Command::Help(topic) => {
            cli::print_help(topic);
            Ok(())
        }
        cli::Command::Run(args) => run::run(args).await,
        cli::Command::Query(args) => query::run(args).await,
    }
}
