use crate::demo::{run_demo, run_evaluate, run_replay, DemoArgs, EvaluateArgs, ReplayArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use relief_grant::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Relief Grant Service",
    about = "Run and exercise the relief-grant eligibility service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Decide a single request against a supplied balance
    Evaluate(EvaluateArgs),
    /// Replay a CSV batch of requests through the rule engine
    Replay(ReplayArgs),
    /// Walk an applicant through drafting, submission, and decisions
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Evaluate(args) => run_evaluate(args).await,
        Command::Replay(args) => run_replay(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
