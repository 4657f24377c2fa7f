use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgGroup, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use unveil_cli::demo::DemoBackend;
use unveil_cli::load_config;
use unveil_cli::simulator::{run_simulator, SimulatorConfig};
use unveil_core::{
    AvailabilityCheck, DebouncedValidator, NoopNotifier, PeopleFinder, PeopleSearchBackend,
    SearchQuery, UnveilConfig, ValidationStatus,
};
use unveil_http::HttpBackend;

fn cli() -> Command {
    let base_url = Arg::new("base-url")
        .long("base-url")
        .value_name("URL")
        .help("Backend base URL; overrides the configuration file");

    Command::new("unveil")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Progressive-disclosure people search and username checks")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log at debug level"),
        )
        .subcommand(
            Command::new("find")
                .about("Search for a person and show each step as it completes")
                .arg(
                    Arg::new("name")
                        .long("name")
                        .num_args(2)
                        .value_names(["FIRST", "LAST"])
                        .help("Search by full name"),
                )
                .arg(
                    Arg::new("email")
                        .long("email")
                        .value_name("ADDRESS")
                        .help("Search by email address"),
                )
                .arg(
                    Arg::new("phone")
                        .long("phone")
                        .value_name("NUMBER")
                        .help("Search by phone number"),
                )
                .group(
                    ArgGroup::new("query")
                        .args(["name", "email", "phone"])
                        .required(true),
                )
                .arg(base_url.clone()),
        )
        .subcommand(
            Command::new("check-username")
                .about("Run one debounced availability check")
                .arg(Arg::new("value").required(true).help("Username to check"))
                .arg(base_url),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run randomized people-finder runs and check controller invariants")
                .arg(
                    Arg::new("runs")
                        .long("runs")
                        .default_value("200")
                        .value_parser(value_parser!(u64))
                        .help("Number of runs to simulate"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("concurrency")
                        .long("concurrency")
                        .default_value("16")
                        .value_parser(value_parser!(usize))
                        .help("Runs in flight at once"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop simulation on first violation"),
                ),
        )
        .subcommand(Command::new("config").about("Print the effective configuration as TOML"))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn query_from(args: &ArgMatches) -> anyhow::Result<SearchQuery> {
    if let Some(mut name) = args.get_many::<String>("name") {
        let (Some(first), Some(last)) = (name.next(), name.next()) else {
            bail!("--name takes a first and a last name");
        };
        return Ok(SearchQuery::name(first, last));
    }
    if let Some(address) = args.get_one::<String>("email") {
        return Ok(SearchQuery::email(address));
    }
    if let Some(number) = args.get_one::<String>("phone") {
        return Ok(SearchQuery::phone(number));
    }
    bail!("one of --name, --email or --phone is required")
}

/// HTTP backend when a base URL is known, else the demo backend
fn backend_for(
    config: &UnveilConfig,
    args: &ArgMatches,
) -> anyhow::Result<(Arc<dyn PeopleSearchBackend>, Arc<dyn AvailabilityCheck>)> {
    let mut http = config.http.clone();
    if let Some(url) = args.get_one::<String>("base-url") {
        http.base_url = Some(url.clone());
    }

    if http.base_url.is_none() {
        tracing::info!("No base URL configured; using the demo backend");
        let demo = Arc::new(DemoBackend::new());
        let people: Arc<dyn PeopleSearchBackend> = demo.clone();
        let availability: Arc<dyn AvailabilityCheck> = demo;
        return Ok((people, availability));
    }

    let backend = Arc::new(HttpBackend::from_config(&http).context("invalid HTTP settings")?);
    tracing::info!(base = %backend.base_url(), "Using HTTP backend");
    let people: Arc<dyn PeopleSearchBackend> = backend.clone();
    let availability: Arc<dyn AvailabilityCheck> = backend;
    Ok((people, availability))
}

async fn find(config: &UnveilConfig, args: &ArgMatches) -> anyhow::Result<bool> {
    let query = query_from(args)?;
    let (people, _) = backend_for(config, args)?;
    let finder = PeopleFinder::new(people, config, Arc::new(NoopNotifier));

    let mut phases = finder.sequencer().watch_phase();
    finder.submit(query.clone()).context("query rejected")?;
    println!("Searching for {query}");

    loop {
        let phase = *phases.borrow_and_update();
        if phase.index().is_some() || phase.is_terminal() {
            println!();
            for row in finder.rows() {
                println!("  {row}");
            }
        }
        if phase.is_terminal() {
            break;
        }
        phases.changed().await.context("finder stopped")?;
    }

    let summary = finder.summary();
    println!("\n{} match(es)", summary.total_matches());
    Ok(summary.account_error.is_none() && summary.record_error.is_none())
}

async fn check_username(config: &UnveilConfig, args: &ArgMatches) -> anyhow::Result<bool> {
    let Some(value) = args.get_one::<String>("value") else {
        bail!("a username is required");
    };
    let (_, availability) = backend_for(config, args)?;
    let validator = DebouncedValidator::new(availability, config.validator, Arc::new(NoopNotifier));

    validator.set_value(value.as_str());
    let state = validator.settle().await;

    let verdict = match state.status {
        ValidationStatus::Available => "available",
        ValidationStatus::Unavailable => "taken",
        ValidationStatus::Unknown if value.trim().chars().count() < validator.min_length() => {
            "too short to check"
        }
        ValidationStatus::Unknown | ValidationStatus::Checking => "unknown (check failed)",
    };
    println!("@{}: {verdict}", state.value.trim());
    Ok(validator.permits_submit())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    let config_path = matches.get_one::<PathBuf>("config").map(PathBuf::as_path);
    let config = load_config(config_path).context("failed to load configuration")?;

    let ok = match matches.subcommand() {
        Some(("find", args)) => find(&config, args).await?,
        Some(("check-username", args)) => check_username(&config, args).await?,
        Some(("simulate", args)) => {
            let sim = SimulatorConfig {
                seed: args.get_one::<u64>("seed").copied().unwrap_or(42),
                runs: args.get_one::<u64>("runs").copied().unwrap_or(200),
                concurrency: args.get_one::<usize>("concurrency").copied().unwrap_or(16),
                stop_on_first_violation: args.get_flag("stop-on-violation"),
            };
            println!("Running simulator: {} runs, seed {}", sim.runs, sim.seed);

            let report = run_simulator(sim).await;
            println!("{}", report.generate_text());
            report.passed()
        }
        Some(("config", _)) => {
            print!("{}", config.to_toml_string()?);
            true
        }
        _ => bail!("unknown subcommand"),
    };

    std::process::exit(if ok { 0 } else { 1 });
}
