use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use coinshop::config::Config;
use coinshop::context::Context;
use coinshop::service::CoinService;
use coinshop::storage;
use color_eyre::eyre::WrapErr as _;

/// Coin ledger and merch shop.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// TOML config file, merged over the defaults and under `COINSHOP_*` env vars.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Creates the account on first use and prints its summary.
    Login {
        name: String,
        #[arg(long, default_value = "")]
        credential: String,
    },
    /// Sends coins and prints the sender summary.
    Send {
        from: String,
        to: String,
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },
    /// Buys one item and prints the buyer summary.
    Buy { name: String, item: String },
    /// Prints an account summary.
    Info { name: String },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    coinshop::logging::init(&config.log_level)?;

    let pool = storage::connect(&config)
        .await
        .wrap_err_with(|| format!("cannot open database url={}", config.database_url))?;
    storage::init_schema(&pool).await?;

    let service = CoinService::from_config(pool, &config);
    let ctx = match config.operation_timeout() {
        Some(timeout) => Context::new().with_timeout(timeout),
        None => Context::new(),
    };

    let account_id = match cli.command {
        Command::Login { name, credential } => service.get_or_create_account(&ctx, &name, &credential).await?.id(),
        Command::Send { from, to, amount } => {
            let sender = service.resolve_id_by_name(&ctx, &from).await?;
            service.transfer(&ctx, sender, &to, amount).await?;
            sender
        }
        Command::Buy { name, item } => {
            let buyer = service.resolve_id_by_name(&ctx, &name).await?;
            service.purchase(&ctx, buyer, &item).await?;
            buyer
        }
        Command::Info { name } => service.resolve_id_by_name(&ctx, &name).await?,
    };

    let summary = service.summary(&ctx, account_id).await?;
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}
