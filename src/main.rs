use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn};
use std::path::PathBuf;

use linknet::config::{AddressCommand, Config};
use linknet::config_loader::{self, CliOverrides};
use linknet::env::{MemoryEnvironment, NetnsEnvironment};
use linknet::ip::SubnetAllocator;
use linknet::session::Session;
use linknet::shell::Shell;
use linknet::topology::{AddressingReport, TopologySpec};
use linknet::utils::BasePrefix;

/// Provision an emulated multi-router network with per-link addressing
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the network, address every link and open an interactive shell
    Run(RunArgs),
    /// Print the address plan without creating anything
    Plan(PlanArgs),
}

#[derive(Args, Debug, Clone, Default)]
struct CommonArgs {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Two-octet base prefix for link subnets (overrides the config file)
    #[arg(long)]
    base_prefix: Option<BasePrefix>,

    /// Log filter (overrides the config file; RUST_LOG wins over both)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Use the in-memory environment and only log the commands
    #[arg(long)]
    dry_run: bool,

    /// Run `ip` through sudo
    #[arg(long)]
    sudo: bool,

    /// Tool used to set interface addresses
    #[arg(long, value_enum)]
    address_command: Option<AddressCommand>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum PlanFormat {
    Json,
    Yaml,
}

#[derive(Args, Debug)]
struct PlanArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: PlanFormat,
}

fn load(common: &CommonArgs, overrides: CliOverrides) -> Result<Config> {
    let mut config = config_loader::load_or_default(common.config.as_deref())?;
    config_loader::apply_overrides(&mut config, &overrides)?;
    Ok(config)
}

fn init_logging(config: &Config) {
    env_logger::Builder::from_env(Env::default().default_filter_or(config.general.log_level.as_str())).init();
}

fn log_report(report: &AddressingReport) {
    for assignment in &report.addressed {
        info!("{}", assignment);
    }
    if let Some(link) = report.failed_link() {
        warn!("Addressing stopped at {}; {} links left unaddressed", link, report.unaddressed.len());
    }
}

fn run(args: RunArgs) -> Result<()> {
    let overrides = CliOverrides {
        base_prefix: args.common.base_prefix,
        command: args.address_command,
        sudo: args.sudo,
        log_level: args.common.log_level.clone(),
    };
    let config = load(&args.common, overrides)?;
    init_logging(&config);

    info!("Starting linknet session");
    info!("Base prefix: {}", config.addressing.base_prefix);

    let spec = TopologySpec::dv_routing_example();
    // installed before anything is created, so Ctrl-C during setup still
    // reaches the shell and goes through teardown
    let mut shell = Shell::stdio().wrap_err("Failed to install interrupt handler")?;

    let report = if args.dry_run {
        let mut session = Session::from_config(MemoryEnvironment::new().with_echo(), &config);
        session.run(&spec, &mut shell)
    } else {
        let mut session = Session::from_config(NetnsEnvironment::new(config.environment.clone()), &config);
        session.run(&spec, &mut shell)
    }
    .wrap_err("Session failed")?;

    log_report(&report);
    info!("Session finished");
    Ok(())
}

fn plan(args: PlanArgs) -> Result<()> {
    let overrides = CliOverrides {
        base_prefix: args.common.base_prefix,
        log_level: args.common.log_level.clone(),
        ..Default::default()
    };
    let config = load(&args.common, overrides)?;
    init_logging(&config);

    let topology = TopologySpec::dv_routing_example()
        .to_topology()
        .wrap_err("Invalid topology")?;
    let plan = SubnetAllocator::new(config.addressing.base_prefix)
        .plan(&topology)
        .wrap_err("Failed to compute address plan")?;

    let rendered = match args.format {
        PlanFormat::Json => serde_json::to_string_pretty(&plan)?,
        PlanFormat::Yaml => serde_yaml::to_string(&plan)?,
    };
    println!("{}", rendered);
    Ok(())
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    match Cli::parse().command {
        Command::Run(args) => run(args),
        Command::Plan(args) => plan(args),
    }
}
