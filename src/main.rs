use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, CommandFactory, Parser, ValueEnum};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::info;
use tracing_subscriber::EnvFilter;

use leasestat::{
    Config, EnrichedLease, Enricher, LeaseQuery, Notice, PoolStat, Report, Result, SortKey,
    StateFilter, Systemctl, check_service, load_journal, pool_statistics, resolve,
};

/// Lease listing row, columns in [`SortKey::ALL`] order.
#[derive(Tabled)]
struct LeaseRow {
    #[tabled(rename = "IP address")]
    ip: String,
    #[tabled(rename = "Hardware address")]
    hardware_address: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Lease start")]
    start: String,
    #[tabled(rename = "Lease expiration")]
    end: String,
    #[tabled(rename = "Remaining")]
    remaining: String,
    #[tabled(rename = "Pool")]
    pool: String,
    #[tabled(rename = "Hostname")]
    hostname: String,
}

impl From<&EnrichedLease> for LeaseRow {
    fn from(lease: &EnrichedLease) -> Self {
        Self {
            ip: lease.ip.to_string(),
            hardware_address: lease.hardware_address.clone().unwrap_or_default(),
            state: lease.state.to_string(),
            start: lease.start.clone(),
            end: lease.end.clone(),
            remaining: lease.remaining.clone(),
            pool: lease.pool.clone(),
            hostname: lease.hostname.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct StatsRow {
    #[tabled(rename = "Pool")]
    pool: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Leases")]
    leases: String,
    #[tabled(rename = "Available")]
    available: String,
    #[tabled(rename = "Usage")]
    usage: String,
}

impl From<&PoolStat> for StatsRow {
    fn from(stat: &PoolStat) -> Self {
        Self {
            pool: stat.name.clone(),
            size: stat.capacity.to_string(),
            leases: stat.active.to_string(),
            available: stat.available.to_string(),
            usage: format!("{}%", stat.utilization),
        }
    }
}

#[derive(Parser)]
#[command(name = "leasestat")]
#[command(author, version, about = "Show DHCP leases and pool statistics", long_about = None)]
#[command(group(ArgGroup::new("mode").args(["leases", "statistics", "allowed"])))]
struct Cli {
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Show DHCP leases
    #[arg(short, long)]
    leases: bool,

    /// Show DHCP pool statistics
    #[arg(short, long)]
    statistics: bool,

    /// Show allowed values for an argument
    #[arg(long, value_enum)]
    allowed: Option<Allowed>,

    /// Show leases for a specific pool
    #[arg(short, long)]
    pool: Option<String>,

    /// Sort by
    #[arg(short = 'S', long, default_value = "ip")]
    sort: String,

    /// Lease states to show
    #[arg(short = 't', long, num_args = 1.., default_value = "active")]
    state: Vec<String>,

    /// Produce JSON output
    #[arg(short, long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Allowed {
    Sort,
    State,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{}", error);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.allowed {
        Some(Allowed::Sort) => {
            println!("{}", SortKey::allowed().join(" "));
            return Ok(ExitCode::SUCCESS);
        }
        Some(Allowed::State) => {
            println!("{}", StateFilter::allowed().join(" "));
            return Ok(ExitCode::SUCCESS);
        }
        None => {}
    }

    if !cli.leases && !cli.statistics {
        Cli::command().print_help()?;
        return Ok(ExitCode::FAILURE);
    }

    let query = LeaseQuery::parse(&cli.state, cli.pool.clone(), &cli.sort)?;
    let config = Config::load(&cli.config)?;

    if !config.is_configured() {
        println!("DHCP service is not configured.");
        return Ok(ExitCode::SUCCESS);
    }

    let records = resolve(load_journal(&config.leases_file).await?);
    let enricher = Enricher::local(config.pool_key.as_str());
    let leases = enricher.enrich_all(&records);
    info!(
        "Loaded {} leases from {} at {}",
        leases.len(),
        config.leases_file,
        enricher.now()
    );

    if cli.leases {
        let report = query.run(leases, &config);
        let report = check_service(&Systemctl, &config.service_name, report).await;
        print_notices(&report, cli.json);
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report.rows)?);
        } else {
            print_table::<LeaseRow, _>(&report);
        }
    } else {
        let report = pool_statistics(&config, &leases, cli.pool.as_deref())?;
        let report = check_service(&Systemctl, &config.service_name, report).await;
        print_notices(&report, cli.json);
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report.rows)?);
        } else {
            print_table::<StatsRow, _>(&report);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Notices go to stderr in JSON mode so stdout stays parseable.
fn print_notices<T>(report: &Report<T>, json: bool) {
    for notice in &report.notices {
        if json {
            eprintln!("{}", notice);
        } else {
            println!("{}", notice);
        }
    }
}

fn print_table<R, T>(report: &Report<T>)
where
    R: Tabled + for<'a> From<&'a T>,
{
    if let Some(table) = render_table::<R, T>(report) {
        println!("{}", table);
    }
}

/// Renders the report rows as a table. An unknown pool is reported by its
/// notice alone, without an empty table under it.
fn render_table<R, T>(report: &Report<T>) -> Option<String>
where
    R: Tabled + for<'a> From<&'a T>,
{
    let unknown_pool = report
        .notices
        .iter()
        .any(|notice| matches!(notice, Notice::NoSuchPool(_)));
    if report.rows.is_empty() && unknown_pool {
        return None;
    }

    let rows: Vec<R> = report.rows.iter().map(R::from).collect();
    Some(Table::new(rows).with(Style::psql()).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use leasestat::BindingState;
    use std::net::{IpAddr, Ipv4Addr};

    fn lease() -> EnrichedLease {
        EnrichedLease {
            ip: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10)),
            hardware_address: Some("00:11:22:33:44:55".to_string()),
            state: BindingState::Active,
            start: "2024/05/01 09:30:00".to_string(),
            end: "2024/05/01 11:15:30".to_string(),
            remaining: "1:15:30".to_string(),
            pool: "LAN".to_string(),
            hostname: None,
            tstp: String::new(),
            tsfp: String::new(),
            atsfp: String::new(),
            cltt: String::new(),
        }
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["leasestat", "-l"]).unwrap();
        assert_eq!(cli.log_level, "warn");
        assert_eq!(cli.config, PathBuf::from("config.json"));
        assert_eq!(cli.sort, "ip");
        assert_eq!(cli.state, vec!["active"]);
        assert!(cli.leases && !cli.statistics && !cli.json);
    }

    #[test]
    fn test_modes_are_exclusive() {
        assert!(Cli::try_parse_from(["leasestat", "-l", "-s"]).is_err());
    }

    #[test]
    fn test_lease_table_has_headers_and_cells() {
        let table = render_table::<LeaseRow, _>(&Report::new(vec![lease()])).unwrap();
        let mut lines = table.lines();

        let header = lines.next().unwrap();
        for column in [
            "IP address",
            "Hardware address",
            "State",
            "Lease start",
            "Lease expiration",
            "Remaining",
            "Pool",
            "Hostname",
        ] {
            assert!(header.contains(column), "missing column {}", column);
        }
        assert!(header.find("IP address") < header.find("Hostname"));

        let row = lines.last().unwrap();
        assert!(row.contains("192.0.2.10"));
        assert!(row.contains("00:11:22:33:44:55"));
        assert!(row.contains("active"));
        assert!(row.contains("1:15:30"));
    }

    #[test]
    fn test_stats_table_shows_percentage() {
        let report = Report::new(vec![PoolStat::new("LAN", 8, 3)]);
        let table = render_table::<StatsRow, _>(&report).unwrap();

        assert!(table.contains("Usage"));
        let row = table.lines().last().unwrap();
        assert!(row.contains("LAN"));
        assert!(row.contains("38%"));
    }

    #[test]
    fn test_unknown_pool_prints_no_table() {
        let report: Report<EnrichedLease> = Report::empty(Notice::NoSuchPool("WIFI".to_string()));
        assert_eq!(render_table::<LeaseRow, _>(&report), None);

        let report: Report<PoolStat> = Report::empty(Notice::NoSuchPool("WIFI".to_string()));
        assert_eq!(render_table::<StatsRow, _>(&report), None);
    }

    #[test]
    fn test_empty_known_pool_still_prints_headers() {
        let report: Report<EnrichedLease> = Report::new(Vec::new());
        let table = render_table::<LeaseRow, _>(&report).unwrap();
        assert!(table.contains("IP address"));

        let stale = Report::new(Vec::new()).with_notice(Notice::ServiceStopped("dhcpd".to_string()));
        assert!(render_table::<LeaseRow, EnrichedLease>(&stale).is_some());
    }
}
