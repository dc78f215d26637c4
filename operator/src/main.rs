use clap::Parser;
use minipg_operator::{
    application::{OperatorApp, crd_yaml, telemetry::init_tracing},
    args::{Args, Command},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(Command::Crd) = args.command {
        print!("{}", crd_yaml()?);
        return Ok(());
    }

    init_tracing(args.log_json);
    OperatorApp::run(&args).await?;

    Ok(())
}
