use clap::{Parser, crate_version};
use eco_charger::{
    cli::{Args, Command, boost, full, plan, rehearse, schedule},
    error::is_no_data,
    prelude::*,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().init();
    info!(version = crate_version!(), "starting…");

    let args = Args::parse();

    let result = match args.command {
        Command::Plan(args) => plan(&args).await,
        Command::Boost(args) => boost(&args).await,
        Command::Full(args) => full(&args).await,
        Command::Schedule(args) => {
            schedule(&args);
            Ok(())
        }
        Command::Rehearse(args) => rehearse(&args).await,
    };

    match result {
        Err(error) if is_no_data(&error) => {
            warn!("{error:#}, try again later");
            Ok(())
        }
        result => result,
    }
}
