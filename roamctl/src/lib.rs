use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use roam_core::{
    load_roam_config, BuildReport, Destination, Plan, PlanStore, Rate,
    RecommendError, Recommender, RecommenderConfig, RoamConfig, Shortlist, StoreState,
    ZoneSummary,
};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] roam_core::ConfigError),
    #[error("{0}")]
    Store(#[from] roam_core::StoreError),
    #[error("{0}")]
    Recommend(#[from] RecommendError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Roaming plan recommendation control interface", long_about = None)]
pub struct Cli {
    /// Path to roam.toml
    #[arg(long, default_value = "configs/roam.toml")]
    pub config: PathBuf,
    /// Alternative plan store database (overrides paths.database)
    #[arg(long)]
    pub database: Option<PathBuf>,
    /// Alternative schema file (overrides paths.schema)
    #[arg(long)]
    pub schema: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Log at debug level (otherwise RUST_LOG, defaulting to warn)
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rebuilds the plan store from the schema and its source files
    Build,
    /// Recommends plans for a trip
    Recommend(RecommendArgs),
    /// Looks up the zone of a destination
    Zone(ZoneArgs),
    /// Lists the plans of a zone
    Plans(ZoneFilter),
    /// Shows the pay-per-use rates of a zone
    Rates(ZoneFilter),
    /// Lists every known destination
    Destinations,
    /// Shows store state, zones and integrity
    Status,
}

#[derive(Args, Debug)]
pub struct RecommendArgs {
    /// Destination country
    #[arg(long)]
    pub destination: String,
    /// Trip length, as "7" or "7 days"
    #[arg(long)]
    pub duration: String,
    /// data, calls or sms
    #[arg(long, default_value = "data")]
    pub service: String,
    /// Minimum data allowance in GB
    #[arg(long)]
    pub data_gb: Option<f64>,
}

#[derive(Args, Debug)]
pub struct ZoneArgs {
    pub country: String,
}

#[derive(Args, Debug)]
pub struct ZoneFilter {
    #[arg(long)]
    pub zone: i64,
}

/// Installs the stderr subscriber so stdout stays clean for `--format json`.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

pub fn run(cli: Cli) -> Result<()> {
    let mut context = AppContext::new(&cli)?;

    match &cli.command {
        Commands::Build => {
            let summary = context.build()?;
            render(&summary, cli.format)?;
        }
        Commands::Recommend(args) => {
            let shortlist = context.recommend(args)?;
            render(&shortlist, cli.format)?;
        }
        Commands::Zone(args) => {
            let lookup = context.zone(&args.country)?;
            render(&lookup, cli.format)?;
        }
        Commands::Plans(filter) => {
            let plans = context.plans(filter.zone)?;
            render(&plans, cli.format)?;
        }
        Commands::Rates(filter) => {
            let rate = context.rates(filter.zone)?;
            render(&rate, cli.format)?;
        }
        Commands::Destinations => {
            let destinations = context.destinations()?;
            render(&destinations, cli.format)?;
        }
        Commands::Status => {
            let status = context.status();
            render(&status, cli.format)?;
        }
    }

    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug)]
struct AppContext {
    database: PathBuf,
    schema: PathBuf,
    recommender: Recommender,
}

impl AppContext {
    fn new(cli: &Cli) -> Result<Self> {
        let config: RoamConfig = load_roam_config(&cli.config)?;
        let database = cli
            .database
            .clone()
            .unwrap_or_else(|| config.database_path());
        let schema = cli.schema.clone().unwrap_or_else(|| config.schema_path());
        debug!(
            target: "roamctl",
            config = %cli.config.display(),
            database = %database.display(),
            schema = %schema.display(),
            "resolved plan store paths"
        );

        let store = match (&cli.database, &cli.schema) {
            (None, None) => PlanStore::from_config(&config)?,
            _ => PlanStore::builder()
                .path(&database)
                .schema_path(&schema)
                .on_build_error(config.store.on_build_error)
                .build()?,
        };
        let recommender =
            Recommender::new(store, RecommenderConfig::from_engine_config(&config.engine));

        Ok(Self {
            database,
            schema,
            recommender,
        })
    }

    fn store(&mut self) -> &mut PlanStore {
        self.recommender.store_mut()
    }

    fn build(&mut self) -> Result<BuildSummary> {
        let report = self.recommender.build_store()?;
        Ok(BuildSummary {
            database: self.database.clone(),
            report,
        })
    }

    fn recommend(&mut self, args: &RecommendArgs) -> Result<Shortlist> {
        let shortlist = self.recommender.recommend_text(
            &args.destination,
            &args.duration,
            &args.service,
            args.data_gb,
        )?;
        Ok(shortlist)
    }

    fn zone(&mut self, country: &str) -> Result<ZoneLookup> {
        let zone = self
            .store()
            .zone_for_destination(country.trim())?
            .ok_or_else(|| RecommendError::UnknownDestination {
                destination: country.to_string(),
            })?;
        Ok(ZoneLookup {
            country: country.trim().to_string(),
            zone,
        })
    }

    fn plans(&mut self, zone: i64) -> Result<PlanList> {
        let rows = self.store().plans_for_zone(zone)?;
        Ok(PlanList { zone, rows })
    }

    fn rates(&mut self, zone: i64) -> Result<Rate> {
        let rate = self
            .store()
            .rate_for_zone(zone)?
            .ok_or(RecommendError::NoRatesForZone { zone })?;
        Ok(rate)
    }

    fn destinations(&mut self) -> Result<DestinationList> {
        let rows = self.store().destinations()?;
        Ok(DestinationList { rows })
    }

    fn status(&mut self) -> StatusReport {
        let zones = self.store().zones().ok();
        let integrity = self.store().integrity_check().ok();
        let store = self.recommender.store();
        StatusReport {
            database: self.database.clone(),
            schema: self.schema.clone(),
            state: store.state(),
            last_error: store.last_error().map(str::to_string),
            integrity,
            zones: zones.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BuildSummary {
    pub database: PathBuf,
    #[serde(flatten)]
    pub report: BuildReport,
}

impl DisplayFallback for BuildSummary {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Built {} at {}",
            self.database.display(),
            self.report.built_at.to_rfc3339()
        )];
        for load in &self.report.tables {
            lines.push(format!(
                "  - {}: {} rows from {}",
                load.table,
                load.rows,
                load.source.display()
            ));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for Shortlist {
    fn display(&self) -> String {
        let matched = match self.matched {
            roam_core::MatchKind::Exact => "exact duration",
            roam_core::MatchKind::Interpolated => "interpolated",
            roam_core::MatchKind::Fallback => "nearest durations unavailable",
        };
        let mut lines = vec![format!(
            "{} (zone {}, {})",
            self.destination.trim(),
            self.zone,
            matched
        )];
        if self.items.is_empty() {
            lines.push("No plan satisfies the request".to_string());
            return lines.join("\n");
        }
        for (idx, item) in self.items.iter().enumerate() {
            let marker = if item.interpolated { " (interpolated)" } else { "" };
            lines.push(format!(
                "{rank}. {days} days | {gb:.2} GB | S${price:.2}{marker}",
                rank = idx + 1,
                days = item.duration_days,
                gb = item.data_gb,
                price = item.price_sgd,
            ));
            lines.push(format!(
                "   pay-per-use: data {:.2}/10KB, calls out {:.2}/min, calls in {:.2}/min, sms {:.2}",
                item.rate_data_per_10kb,
                item.rate_calls_outgoing_per_min,
                item.rate_calls_incoming_per_min,
                item.rate_per_sms
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct ZoneLookup {
    pub country: String,
    pub zone: i64,
}

impl DisplayFallback for ZoneLookup {
    fn display(&self) -> String {
        format!("{}: zone {}", self.country, self.zone)
    }
}

#[derive(Debug, Serialize)]
pub struct PlanList {
    pub zone: i64,
    pub rows: Vec<Plan>,
}

impl DisplayFallback for PlanList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return format!("No plans for zone {}", self.zone);
        }
        let mut lines = Vec::new();
        for plan in &self.rows {
            let id = plan
                .plan_id()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            lines.push(format!(
                "#{id} zone={zone} {days} days | {gb:.2} GB | S${price:.2}",
                zone = plan.zone,
                days = plan.duration_days,
                gb = plan.data_gb,
                price = plan.price_sgd,
            ));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for Rate {
    fn display(&self) -> String {
        [
            format!("Zone {} pay-per-use rates", self.zone),
            format!("  - data: {:.2} per 10KB", self.rate_data_per_10kb),
            format!("  - outgoing calls: {:.2} per min", self.rate_calls_outgoing_per_min),
            format!("  - incoming calls: {:.2} per min", self.rate_calls_incoming_per_min),
            format!("  - sms: {:.2} each", self.rate_per_sms),
        ]
        .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct DestinationList {
    pub rows: Vec<Destination>,
}

impl DisplayFallback for DestinationList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No destinations loaded".to_string();
        }
        self.rows
            .iter()
            .map(|row| format!("{} | zone {}", row.country, row.zone))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub database: PathBuf,
    pub schema: PathBuf,
    pub state: StoreState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<ZoneSummary>,
}

impl DisplayFallback for StatusReport {
    fn display(&self) -> String {
        let mut lines = vec![
            format!("Store: {} ({})", self.database.display(), self.state),
            format!("Schema: {}", self.schema.display()),
        ];
        if let Some(err) = &self.last_error {
            lines.push(format!("Last error: {err}"));
        }
        match &self.integrity {
            Some(result) => lines.push(format!("Integrity: {result}")),
            None => lines.push("Integrity: unavailable".to_string()),
        }
        if !self.zones.is_empty() {
            lines.push("Zones:".to_string());
            for zone in &self.zones {
                let rates = if zone.has_rates { "rates" } else { "no rates" };
                lines.push(format!(
                    "  - zone {}: {} destinations, {} plans, {rates}",
                    zone.zone, zone.destinations, zone.plans
                ));
            }
        }
        lines.join("\n")
    }
}
