use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use ethers::types::Address;
use launchpad_client::amount::{format_native, parse_native};
use launchpad_client::app::{
    BUY_FAILED, FETCH_FAILED, GRADUATE_FAILED, LAUNCH_FAILED, SELL_FAILED,
};
use launchpad_client::deploy::{DEX_FACTORY, DEX_ROUTER, TOKEN_FACTORY};
use launchpad_client::session::{LaunchForm, DEFAULT_METADATA_URI};
use launchpad_client::{
    deploy_stack, ActionOrchestrator, ActionRun, ChainClient, LaunchedToken, NetworkConfig,
    RpcClient, TokenRegistryView,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Token launchpad client")]
struct Args {
    /// Network config JSON. Defaults to Monad testnet.
    #[arg(long, global = true)]
    network: Option<PathBuf>,

    /// Signing key.
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true, global = true)]
    private_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deploy MockDexFactory, MockDexRouter and TokenFactory.
    Deploy {
        /// Hardhat artifacts directory.
        #[arg(long, default_value = "artifacts")]
        artifacts: PathBuf,
        /// Wrapped native token. Defaults to the network's.
        #[arg(long)]
        wrapped_native: Option<String>,
    },
    /// List launched tokens.
    Tokens,
    /// Launch a token, approving the fee first.
    Launch {
        #[arg(long)]
        name: String,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = DEFAULT_METADATA_URI)]
        uri: String,
        /// Graduation market cap in native units.
        #[arg(long)]
        graduation_market_cap: String,
    },
    /// Buy from a token's curve, spending AMOUNT native units.
    Buy { token: String, amount: String },
    /// Sell AMOUNT tokens back to the curve.
    Sell { token: String, amount: String },
    /// Graduate a token's curve to the DEX.
    Graduate { token: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.network {
        Some(path) => NetworkConfig::from_file(path)?,
        None => NetworkConfig::monad_testnet(),
    };

    if let Command::Tokens = args.command {
        let client = Arc::new(RpcClient::connect(&config, None)?);
        return list_tokens(client, &config).await;
    }

    let wallet = config.signer(args.private_key.as_deref())?;
    let client = Arc::new(RpcClient::connect(&config, Some(wallet))?);

    match args.command {
        Command::Deploy {
            artifacts,
            wrapped_native,
        } => deploy(&client, &config, artifacts, wrapped_native).await,
        Command::Tokens => list_tokens(client, &config).await,
        Command::Launch {
            name,
            symbol,
            uri,
            graduation_market_cap,
        } => {
            let form = LaunchForm {
                name,
                symbol,
                uri,
                graduation_market_cap,
            };
            let request = form.validate()?;
            let orchestrator = ActionOrchestrator::new(client, config);
            report(orchestrator.launch(&request).await, LAUNCH_FAILED)
        }
        Command::Buy { token, amount } => {
            let token = find_token(Arc::clone(&client), &config, &token).await?;
            let amount = parse_native(&amount)?;
            let orchestrator = ActionOrchestrator::new(client, config);
            report(orchestrator.buy(&token, amount).await, BUY_FAILED)
        }
        Command::Sell { token, amount } => {
            let token = find_token(Arc::clone(&client), &config, &token).await?;
            let amount = parse_native(&amount)?;
            let orchestrator = ActionOrchestrator::new(client, config);
            report(orchestrator.sell(&token, amount).await, SELL_FAILED)
        }
        Command::Graduate { token } => {
            let token = find_token(Arc::clone(&client), &config, &token).await?;
            let orchestrator = ActionOrchestrator::new(client, config);
            report(orchestrator.graduate(&token).await, GRADUATE_FAILED)
        }
    }
}

async fn deploy(
    client: &RpcClient,
    config: &NetworkConfig,
    artifacts: PathBuf,
    wrapped_native: Option<String>,
) -> Result<()> {
    let deployer = client.signer().context("no signer configured")?;
    let balance = client.balance(deployer).await?;
    println!("Deploying contracts to {} with the account: {deployer:?}", config.name);
    println!(
        "Account balance: {} {}",
        format_native(balance),
        config.native_currency.symbol
    );

    let wrapped_native = match wrapped_native {
        Some(raw) => parse_address(&raw)?,
        None => config.contracts.wrapped_native,
    };
    let deployer = client.deployer(artifacts)?;
    let deployed = deploy_stack(&deployer, wrapped_native).await?;

    println!("{DEX_FACTORY} deployed to: {:?}", deployed.dex_factory);
    println!("{DEX_ROUTER} deployed to: {:?}", deployed.dex_router);
    println!("{TOKEN_FACTORY} deployed to: {:?}", deployed.token_factory);
    println!("{}", serde_json::to_string_pretty(&deployed)?);
    Ok(())
}

async fn list_tokens(client: Arc<RpcClient>, config: &NetworkConfig) -> Result<()> {
    let mut registry = TokenRegistryView::new(client, config.contracts.token_factory);
    registry
        .refresh()
        .await
        .context(FETCH_FAILED)?;

    for token in registry.tokens() {
        println!(
            "{:?}  {:<24} {:<8} market cap {} {}{}",
            token.address,
            token.name,
            token.symbol,
            token.market_cap_display(),
            config.native_currency.symbol,
            if token.is_graduated { "  (graduated)" } else { "" }
        );
    }
    for failure in registry.failures() {
        eprintln!("{:?}  unavailable: {}", failure.token, failure.error);
    }
    Ok(())
}

async fn find_token(
    client: Arc<RpcClient>,
    config: &NetworkConfig,
    raw: &str,
) -> Result<LaunchedToken> {
    let address = parse_address(raw)?;
    let mut registry = TokenRegistryView::new(client, config.contracts.token_factory);
    registry
        .refresh()
        .await
        .context(FETCH_FAILED)?;
    match registry.get(address) {
        Some(token) => Ok(token.clone()),
        None => bail!("{address:?} is not a launched token"),
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    raw.parse::<Address>()
        .map_err(|e| anyhow!("invalid address {raw}: {e}"))
}

fn report(run: ActionRun, failed: &'static str) -> Result<()> {
    let receipt = run.into_result().context(failed)?;
    info!(tx = ?receipt.tx_hash, block = receipt.block_number, "done");
    println!("confirmed {:?} in block {}", receipt.tx_hash, receipt.block_number);
    Ok(())
}
