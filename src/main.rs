use alloy::providers::ProviderBuilder;
use clap::{Parser, Subcommand, ValueEnum};
use eyre::Result;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use swapdesk::balances::BalanceRegistry;
use swapdesk::config::EngineConfig;
use swapdesk::jupiter::JupiterClient;
use swapdesk::price::PriceApiClient;
use swapdesk::quote::RefreshOutcome;
use swapdesk::spot_prices::SpotPrices;
use swapdesk::wallet::{Collaborators, EvmClient, MultiChainReader, SolanaClient};
use swapdesk::zrx::ZrxClient;
use swapdesk::{AmountValue, BlockchainToken, CoinType, NetworkInfo, RefreshOverrides, SwapEngine};

#[derive(Parser)]
#[command(name = "swapdesk")]
#[command(about = "Swap quote engine (order router + multi-route)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Network {
    Eth,
    Sol,
}

impl Network {
    fn info(self) -> NetworkInfo {
        match self {
            Network::Eth => NetworkInfo::ethereum_mainnet(),
            Network::Sol => NetworkInfo::solana_mainnet(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and compare quotes
    Quote {
        #[arg(long, value_enum, default_value = "eth")]
        network: Network,

        /// `native` or ADDRESS:SYMBOL:DECIMALS
        #[arg(long, default_value = "native")]
        from: String,

        /// `native` or ADDRESS:SYMBOL:DECIMALS
        #[arg(long)]
        to: String,

        /// Amount in display units
        #[arg(long)]
        amount: String,

        /// Treat the amount as the output amount (order router only)
        #[arg(long, default_value = "false")]
        exact_out: bool,

        /// Taker address; enables allowance and balance checks
        #[arg(long)]
        account: Option<String>,
    },

    /// Show balances for an account
    Balances {
        #[arg(long, value_enum, default_value = "eth")]
        network: Network,

        #[arg(long)]
        account: String,

        /// Extra tokens as ADDRESS:SYMBOL:DECIMALS
        #[arg(long = "token")]
        tokens: Vec<String>,
    },

    /// Show spot prices for a pair
    Prices {
        #[arg(long, value_enum, default_value = "eth")]
        network: Network,

        #[arg(long, default_value = "native")]
        from: String,

        #[arg(long)]
        to: Option<String>,
    },
}

/// `native` or `ADDRESS:SYMBOL:DECIMALS`
fn parse_token(raw: &str, network: &NetworkInfo) -> Result<BlockchainToken> {
    if raw.eq_ignore_ascii_case("native") {
        return Ok(network.native_asset());
    }

    let parts: Vec<&str> = raw.split(':').collect();
    let [address, symbol, decimals] = parts.as_slice() else {
        return Err(eyre::eyre!("Invalid token {}. Use native or ADDRESS:SYMBOL:DECIMALS", raw));
    };

    Ok(BlockchainToken {
        contract_address: address.to_string(),
        name: symbol.to_string(),
        symbol: symbol.to_string(),
        decimals: decimals.parse()?,
        is_token: true,
        chain_id: network.chain_id.clone(),
        coin: network.coin,
        coingecko_id: String::new(),
        visible: true,
    })
}

fn build_engine(config: &EngineConfig, network: NetworkInfo) -> Result<SwapEngine> {
    let url: reqwest::Url = config.evm_rpc_url.parse()?;
    let evm = Arc::new(EvmClient::new(ProviderBuilder::new().connect_http(url)));
    let solana = Arc::new(SolanaClient::new(&config.solana_rpc_url));

    let collaborators = Collaborators {
        chain: Arc::new(MultiChainReader::new(evm.clone(), solana.clone())),
        prices: Arc::new(PriceApiClient::new(&config.price_api_base, swapdesk::config::FIAT_CURRENCY)),
        eth_wallet: evm,
        sol_wallet: solana,
    };

    Ok(SwapEngine::with_backends(
        config,
        collaborators,
        Arc::new(ZrxClient::new(&config.zrx_api_base, config.zrx_api_key.clone())),
        Arc::new(JupiterClient::new(&config.jupiter_api_base)),
        network,
    ))
}

async fn run_quote(
    config: &EngineConfig,
    network: NetworkInfo,
    from: &str,
    to: &str,
    amount: &str,
    exact_out: bool,
    account: Option<String>,
) -> Result<()> {
    let engine = build_engine(config, network.clone())?;
    let from = parse_token(from, &network)?;
    let to = parse_token(to, &network)?;

    engine.select_from_token(from.clone());
    engine.select_to_token(to.clone());
    if let Some(account) = &account {
        engine.set_account(account);
        engine.refresh_blockchain_state(RefreshOverrides::default()).await;
    }
    engine.refresh_spot_prices(RefreshOverrides::default()).await;

    let outcome = if exact_out {
        engine.handle_on_set_to_amount(amount).await
    } else {
        engine.handle_on_set_from_amount(amount).await
    };

    if let RefreshOutcome::Failed(e) = &outcome {
        println!("Quote failed: {}", e);
    }

    let options = engine.quote_options();
    println!();
    println!("══════════════════════════════════════════════════════════════");
    println!("  {} {} -> {} on {}", engine.from_amount(), from.symbol, to.symbol, network.chain_name);
    println!("══════════════════════════════════════════════════════════════");

    for (index, option) in options.iter().enumerate() {
        let minimum = option
            .minimum_to_amount
            .as_ref()
            .map(|m| m.format(Some(6)))
            .unwrap_or_default();
        let sources: Vec<String> = option
            .sources
            .iter()
            .map(|s| format!("{} {}%", s.name, s.proportion.times(&AmountValue::from(100u64)).format(Some(2))))
            .collect();

        println!("  [{}] {} {} ({})", index, option.to_amount.format(Some(6)), to.symbol, option.routing);
        println!("      minimum received: {} {}", minimum, to.symbol);
        println!("      rate:             {}", option.rate.format(Some(8)));
        println!("      price impact:     {}%", option.price_impact.format(Some(4)));
        println!("      network fee:      {}", option.network_fee);
        println!("      sources:          {}", sources.join(", "));
        if let Some(fee) = &option.brave_fee {
            println!("      platform fee:     {}%", fee.effective_fee_percent);
        }
    }

    println!("──────────────────────────────────────────────────────────────");
    println!("  Spot delta:   {}%", engine.spot_price_delta().format(Some(2)));
    println!("  Value:        {}", engine.fiat_value(&AmountValue::new(&engine.from_amount()), &from));
    println!(
        "  Verdict:      {}",
        engine
            .swap_validation_error()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    println!(
        "  Submit:       {}{}",
        engine.submit_button_text(),
        if engine.is_submit_button_disabled() { " (disabled)" } else { "" }
    );
    println!();

    Ok(())
}

fn print_balances(network: &NetworkInfo, assets: &[BlockchainToken], registry: &BalanceRegistry) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  BALANCES on {:<48}║", network.chain_name);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for asset in assets {
        let balance = registry.balance_of(asset);
        let shown = if balance.is_undefined() {
            "unavailable".to_string()
        } else {
            balance.divide_by_decimals(asset.decimals).format(Some(6))
        };
        println!("║  {:>10}: {:>30}                    ║", asset.symbol, shown);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
}

async fn run_balances(config: &EngineConfig, network: NetworkInfo, account: &str, tokens: &[String]) -> Result<()> {
    let engine = build_engine(config, network.clone())?;
    let mut assets = vec![network.native_asset()];
    for raw in tokens {
        assets.push(parse_token(raw, &network)?);
    }

    engine.set_account(account);
    let registry = engine
        .refresh_blockchain_state(RefreshOverrides {
            assets: Some(assets.clone()),
            ..RefreshOverrides::default()
        })
        .await;

    print_balances(&network, &assets, &registry);
    Ok(())
}

fn print_prices(prices: &SpotPrices) {
    let show = |raw: &str| if raw.is_empty() { "unavailable".to_string() } else { raw.to_string() };
    println!("  native: {}", show(&prices.native_asset));
    println!("  from:   {}", show(&prices.maker_asset));
    println!("  to:     {}", show(&prices.taker_asset));
}

async fn run_prices(config: &EngineConfig, network: NetworkInfo, from: &str, to: Option<&str>) -> Result<()> {
    let engine = build_engine(config, network.clone())?;
    let from = parse_token(from, &network)?;
    let to = to.map(|raw| parse_token(raw, &network)).transpose()?;

    let prices = engine
        .refresh_spot_prices(RefreshOverrides {
            from_token: Some(from),
            to_token: to,
            ..RefreshOverrides::default()
        })
        .await;

    print_prices(&prices);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = EngineConfig::from_env()?;
    config.log_config();

    let cli = Cli::parse();

    match cli.command {
        Commands::Quote { network, from, to, amount, exact_out, account } => {
            let network = network.info();
            if exact_out && network.coin == CoinType::Sol {
                info!("Multi-route quotes are exact-input only; no quote will be requested");
            }
            run_quote(&config, network, &from, &to, &amount, exact_out, account).await
        }
        Commands::Balances { network, account, tokens } => {
            run_balances(&config, network.info(), &account, &tokens).await
        }
        Commands::Prices { network, from, to } => {
            run_prices(&config, network.info(), &from, to.as_deref()).await
        }
    }
}
