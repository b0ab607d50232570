// fraxctl - drive the escrow orchestration against an in-memory devnet

use clap::{Parser, Subcommand};
use ipfrax::identity::{Keypair, Session};
use ipfrax::ledger::DevnetLedger;
use ipfrax::market::{CreateListing, Marketplace};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fraxctl", about = "Fractional IP escrow orchestration demo")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full listing lifecycle: mint, deploy, reprice, buy, close
    Demo {
        /// Display name of the patent
        #[arg(long, default_value = "QuantumPatent")]
        name: String,

        /// Initial price per unit, in microalgos
        #[arg(long, default_value_t = 5)]
        price: u64,

        /// Units the buyer purchases
        #[arg(long, default_value_t = 10)]
        quantity: u64,

        /// Subdivision of one whole ownership unit
        #[arg(long, default_value_t = 3)]
        decimals: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Demo {
            name,
            price,
            quantity,
            decimals,
        } => demo(&name, price, quantity, decimals).await,
    }
}

async fn demo(
    name: &str,
    price: u64,
    quantity: u64,
    decimals: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = Arc::new(DevnetLedger::new());
    let market = Marketplace::new(ledger.clone()).with_token_decimals(decimals);

    let owner = Session::from_keypair(Keypair::generate());
    let buyer = Session::from_keypair(Keypair::generate());
    ledger.fund(owner.address(), 10_000_000);
    ledger.fund(buyer.address(), 10_000_000);

    let contract = match market
        .create_listing(&owner, &CreateListing::new(name, price))
        .await
    {
        Ok(contract) => contract,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Err(e.into());
        }
    };
    println!(
        "listed {name}: {} at {} custodying {} units",
        contract.app_id(),
        contract.asset_id(),
        contract.units_remaining()
    );

    let contract = market.set_price(&owner, &contract, price + 2).await?;
    println!("repriced to {} microalgos per unit", contract.unitary_price());

    let (contract, receipt) = market.buy_shares(&buyer, &contract, quantity).await?;
    println!(
        "bought {} units for {} microalgos, {} remaining (round {})",
        receipt.order.quantity(),
        receipt.order.total_cost(),
        contract.units_remaining(),
        receipt.confirmed_round
    );

    let (contract, receipt) = market.close_listing(&owner, &contract).await?;
    println!(
        "closed {}: {} microalgos proceeds, {} units returned",
        contract.app_id(),
        receipt.proceeds,
        receipt.returned_units
    );
    Ok(())
}
