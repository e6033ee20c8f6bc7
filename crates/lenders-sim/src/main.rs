//! Lenders Simulator
//!
//! Replays the reference pool lifecycle against an in-memory asset bank,
//! then runs a batch of concurrent liquidity providers and dumps the journal.
//!
//! Usage: `lenders-sim [config-file]`. `LENDERS_*` variables override the file.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lenders_common::math::units_frac;
use lenders_common::{units, Address, EngineConfig, VERSION};
use lenders_factory::{AssetBank, Factory, InMemoryAssetBank};

const CONCURRENT_PROVIDERS: u8 = 8;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting Lenders simulator v{}", VERSION);

    let path = std::env::args().nth(1);
    let config = EngineConfig::load(path.as_deref())?;
    info!("Loaded configuration: {:?}", config);

    let bank = Arc::new(InMemoryAssetBank::new());
    let factory = Factory::bootstrap(&config, bank.clone())?;

    let dai = Address::repeat_byte(0xda);
    let provider = Address::repeat_byte(0x01);
    let borrower = Address::repeat_byte(0x02);

    // Pool and liquidity
    let handle = factory.create_pool(provider, dai, "Dai", "Dai")?;
    info!(%handle, "Dai pool ready");

    bank.mint(&dai, provider, units(10_000))?;
    bank.mint(&dai, borrower, units(2000))?;
    bank.approve(&dai, provider, factory.address(), units(5000))?;

    factory.add_liquidity(provider, units(4000), dai)?;
    factory.withdraw_liquidity(provider, units(200), dai)?;
    factory.add_liquidity(provider, units(200), dai)?;
    info!(
        total = %factory.provider().total_liquidity(&dai)?,
        "Liquidity settled"
    );

    // Loan lifecycle
    let quote = factory.strategy().quote(&dai, units(1500), 1)?;
    info!(
        interest = %quote.interest_due,
        collateral = %quote.collateral_required,
        "Quoted 1500 Dai for one term"
    );

    factory.pay_interest(borrower, dai, units(1500), 1, units_frac(815, 1))?;
    factory.issue_loan(borrower, dai, 1, units(1500))?;
    info!(free = %factory.balance_supply(&dai)?, "Loan outstanding");

    let settlement = factory.payback_loan(borrower, dai, units(1500))?;
    info!(
        collateral = %settlement.collateral_returned,
        interest = %settlement.interest_retained,
        "Loan settled"
    );

    // Concurrent providers
    let mut tasks = Vec::new();
    for i in 0..CONCURRENT_PROVIDERS {
        let account = Address::repeat_byte(0x80 + i);
        bank.mint(&dai, account, units(100))?;
        bank.approve(&dai, account, factory.address(), units(100))?;

        let factory = factory.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            factory.add_liquidity(account, units(100), dai)?;
            factory.withdraw_liquidity(account, units(25), dai)
        }));
    }
    for task in tasks {
        task.await??;
    }

    let summary = factory.provider().pool_summary(&dai)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    print!("{}", factory.journal_json_lines()?);

    anyhow::ensure!(factory.invariants_hold()?, "engine invariants violated");
    info!("Simulation complete");
    Ok(())
}
