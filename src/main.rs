//! tokendrop: command-line front end for the Cardano airdrop batch planner.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokendrop::address_parser::parse_address_file;
use tokendrop::collaborators::{
    collect_policy_holders, scan_assets, BlacklistSource, HttpBlacklist, KoiosClient, NoBlacklist,
    SimulatedWallet, StaticBlacklist,
};
use tokendrop::config::{get_address_explorer_url, get_tx_explorer_url, Config};
use tokendrop::executor::AirdropRunner;
use tokendrop::notifications::ConsoleNotifier;
use tokendrop::session::AirdropSession;
use tokendrop::types::AssetUnit;
use tokendrop::user_settings::UserSettings;
use tokendrop::utils;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tokendrop", version, about = "Cardano airdrop batch planner")]
struct Cli {
    /// Network: "mainnet", "preprod" or "preview". Defaults to the saved setting.
    #[arg(long, env = "TOKENDROP_NETWORK")]
    network: Option<String>,

    /// Koios API base URL, e.g. https://api.koios.rest/api/v1
    #[arg(long, env = "TOKENDROP_KOIOS_URL")]
    koios_url: Option<String>,

    /// Blacklist service URL returning {"addresses": [...]}.
    #[arg(long, env = "TOKENDROP_BLACKLIST_URL")]
    blacklist_url: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "warn", env = "TOKENDROP_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Clean up an address list: validate, deduplicate, report rejects.
    Parse {
        file: PathBuf,
        /// Write the valid addresses, one per line.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Look up the current holders of one or more policies.
    Holders {
        /// Policy IDs or saved policy labels.
        #[arg(required = true)]
        policies: Vec<String>,
        /// Print an explorer link next to each address.
        #[arg(long)]
        links: bool,
    },
    /// Dry-run an airdrop against a simulated wallet.
    Plan(PlanArgs),
    /// Manage saved policy IDs.
    Policies {
        #[command(subcommand)]
        action: PolicyAction,
    },
}

#[derive(clap::Args)]
struct PlanArgs {
    /// Address list files (text or CSV).
    #[arg(long = "addresses")]
    address_files: Vec<PathBuf>,

    /// Add current holders of these policies (IDs or saved labels).
    #[arg(long = "policy")]
    policies: Vec<String>,

    /// Amount per recipient, in whole units (e.g. "2.5" ADA).
    #[arg(long)]
    amount: String,

    /// Asset unit: "lovelace" or policy ID followed by hex asset name.
    #[arg(long, default_value = "lovelace")]
    unit: String,

    /// Simulated wallet balance of the asset, in whole units.
    #[arg(long)]
    balance: String,

    /// Simulated ADA held for fees when airdropping a token.
    #[arg(long, default_value = "100")]
    ada: String,

    /// Simulated per-transaction output limit.
    #[arg(long, default_value_t = tokendrop::collaborators::simulated::DEFAULT_MAX_OUTPUTS)]
    max_outputs: usize,

    /// Simulated fee per transaction, in ADA.
    #[arg(long, default_value = "0")]
    fee: String,

    /// Local blacklist file, one address per line. Overrides the service.
    #[arg(long)]
    blacklist_file: Option<PathBuf>,

    /// Write per-batch results to this CSV file.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(clap::Subcommand)]
enum PolicyAction {
    /// Save a policy ID under a label.
    Add { label: String, policy_id: String },
    /// List saved policies.
    List,
    /// Remove a saved policy by label or ID.
    Remove { key: String },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Saved settings, then environment, then flags.
fn load_config(cli: &Cli, settings: &UserSettings) -> Result<Config> {
    let mut config = settings.to_config()?.with_env()?;
    if let Some(network) = &cli.network {
        config.network = network.parse()?;
    }
    if let Some(url) = &cli.koios_url {
        config.set_koios_url(url)?;
    }
    if let Some(url) = &cli.blacklist_url {
        config.set_blacklist_url(url)?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut settings = UserSettings::load();
    let config = load_config(&cli, &settings)?;
    tracing::info!("Using network {}", config.network_label());

    match &cli.command {
        Command::Parse { file, out } => run_parse(file, out.as_ref()),
        Command::Holders { policies, links } => {
            run_holders(&config, &settings, policies, *links).await
        }
        Command::Plan(args) => run_plan(&config, &settings, args).await,
        Command::Policies { action } => run_policies(&mut settings, action),
    }
}

fn run_parse(file: &Path, out: Option<&PathBuf>) -> Result<()> {
    let parsed = parse_address_file(file)?;
    println!("{}", parsed.summary());
    for rejected in &parsed.invalid {
        println!("  invalid: {}", rejected);
    }
    for duplicate in &parsed.duplicates {
        println!("  duplicate: {}", duplicate);
    }
    if let Some(out) = out {
        let body: Vec<&str> = parsed.valid_addresses.iter().map(|a| a.as_str()).collect();
        std::fs::write(out, body.join("\n") + "\n")
            .map_err(|e| anyhow!("Failed to write {}: {}", out.display(), e))?;
        println!("Wrote {} address(es) to {}", body.len(), out.display());
    }
    Ok(())
}

async fn run_holders(
    config: &Config,
    settings: &UserSettings,
    policies: &[String],
    links: bool,
) -> Result<()> {
    let policy_ids: Vec<String> = policies.iter().map(|p| settings.resolve_policy(p)).collect();
    let client = KoiosClient::from_config(config)?;
    let lookup = collect_policy_holders(&client, &policy_ids, config.network, &config.retry).await?;
    for address in lookup.addresses.iter() {
        if links {
            println!("{}  {}", address, get_address_explorer_url(config.network, address.as_str()));
        } else {
            println!("{}", address);
        }
    }
    eprintln!(
        "{} unique holder address(es), {} skipped",
        lookup.addresses.len(),
        lookup.skipped
    );
    Ok(())
}

async fn run_plan(config: &Config, settings: &UserSettings, args: &PlanArgs) -> Result<()> {
    let unit = AssetUnit::from_unit(&args.unit)?;
    let decimals = if unit.is_native() { utils::ADA_DECIMALS } else { 0 };
    let balance = utils::parse_amount_str(&args.balance, decimals)?;
    let fee = utils::parse_ada_str_to_lovelace(&args.fee)?;

    let mut wallet = SimulatedWallet::new()
        .with_balance(unit.clone(), balance)
        .with_max_outputs(Some(args.max_outputs))
        .with_fee(fee);
    if !unit.is_native() {
        wallet = wallet.with_balance(AssetUnit::Lovelace, utils::parse_ada_str_to_lovelace(&args.ada)?);
    }

    let mut session = AirdropSession::new();
    for file in &args.address_files {
        let merged = session.add_file(file)?;
        println!(
            "{}: {} new, {} already listed",
            file.display(),
            merged.added,
            merged.repeats.len()
        );
    }
    if !args.policies.is_empty() {
        let policy_ids: Vec<String> = args
            .policies
            .iter()
            .map(|p| settings.resolve_policy(p))
            .collect();
        let client = KoiosClient::from_config(config)?;
        let merged = session
            .add_policy_holders(&client, &policy_ids, config.network, &config.retry)
            .await?;
        println!("Policy holders: {} new, {} already listed", merged.added, merged.repeats.len());
    }
    if !session.invalid().is_empty() {
        println!("Skipped {} invalid entries", session.invalid().len());
    }

    let asset = scan_assets(&wallet)
        .await?
        .into_iter()
        .find(|a| a.unit == unit)
        .ok_or_else(|| anyhow!("Simulated wallet holds no {}", unit))?;
    session.select_asset(asset);
    session.set_amount_str(&args.amount)?;

    let blacklist: Box<dyn BlacklistSource> = match (&args.blacklist_file, &config.blacklist_url) {
        (Some(path), _) => Box::new(StaticBlacklist::from_file(path)?),
        (None, Some(url)) => Box::new(HttpBlacklist::new(
            url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?),
        (None, None) => Box::new(NoBlacklist),
    };

    let mut runner = AirdropRunner::new(&wallet, blacklist.as_ref(), ConsoleNotifier)
        .with_retry(config.retry.clone());
    let report = runner.run(&session).await?;

    println!("{}", report.summary());
    for hash in report.tx_hashes() {
        println!("  simulated tx {}  {}", hash, get_tx_explorer_url(config.network, &hash.to_string()));
    }
    if let Some(path) = &args.report {
        report.write_csv(path)?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn run_policies(settings: &mut UserSettings, action: &PolicyAction) -> Result<()> {
    match action {
        PolicyAction::Add { label, policy_id } => {
            if settings.add_policy(label, policy_id)? {
                settings.save()?;
                println!("Saved policy '{}'", label);
            } else {
                println!("Policy {} is already saved", policy_id);
            }
        }
        PolicyAction::List => {
            if settings.saved_policies.is_empty() {
                println!("No saved policies ({})", UserSettings::settings_path_display());
            }
            for policy in &settings.saved_policies {
                println!("{:<20} {}", policy.label, policy.policy_id);
            }
        }
        PolicyAction::Remove { key } => {
            if settings.remove_policy(key) {
                settings.save()?;
                println!("Removed '{}'", key);
            } else {
                println!("No saved policy matches '{}'", key);
            }
        }
    }
    Ok(())
}
