//! ipbase: build binary IP bases from CSV registries and serve lookups.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ipbase::base::{BaseReader, BaseWriter, CompanyRecord, CountryRecord};
use ipbase::http::{self, AppState};
use ipbase::{
    read_prefix_csv, CancelFlag, IpRegistry, IpVersion, LookupService, NoopCache,
    ASN_CSV_FIELDS, COUNTRY_CSV_FIELDS,
};

const PROGRESS_EVERY: u64 = 256_000;

#[derive(Parser)]
#[command(name = "ipbase")]
#[command(version = "0.1.0")]
#[command(about = "Convert IP registry CSV files into compact binary bases and serve lookups", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a country base from an ip-to-country CSV
    Country2ip {
        /// Input CSV file
        #[arg(short, long, default_value = "ip-to-country.csv")]
        input: PathBuf,

        /// Output base file
        #[arg(short, long, default_value = "country2ip.bin")]
        output: PathBuf,

        /// Read the output base back instead of writing
        #[arg(short, long)]
        read: bool,

        /// Country codes to keep while reading
        #[arg(short, long, value_delimiter = ',')]
        codes: Vec<String>,

        /// IP version filter: ipv4, ipv6 or all
        #[arg(short = 'v', long = "version", default_value = "all")]
        ip_version: String,
    },

    /// Build a company base from an ip-to-asn CSV
    Asn2ip {
        /// Input CSV file
        #[arg(short, long, default_value = "ip-to-asn.csv")]
        input: PathBuf,

        /// Output base file
        #[arg(short, long, default_value = "asn2ip.bin")]
        output: PathBuf,

        /// Read the output base back instead of writing
        #[arg(short, long)]
        read: bool,
    },

    /// Build the registry from both CSVs and serve the lookup API
    Serve {
        /// ip-to-country CSV file
        #[arg(long, default_value = "ip-to-country.csv")]
        country_csv: PathBuf,

        /// ip-to-asn CSV file
        #[arg(long, default_value = "ip-to-asn.csv")]
        asn_csv: PathBuf,

        /// Listen address
        #[arg(short, long, default_value = "0.0.0.0:8080")]
        listen: SocketAddr,

        /// IP version filter: ipv4, ipv6 or all
        #[arg(short = 'v', long = "version", default_value = "all")]
        ip_version: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Country2ip {
            input,
            output,
            read,
            codes,
            ip_version,
        } => {
            if read {
                read_country_base(&output, &codes, IpVersion::parse(&ip_version))
            } else {
                build_country_base(&input, &output, IpVersion::parse(&ip_version))
            }
        }
        Commands::Asn2ip {
            input,
            output,
            read,
        } => {
            if read {
                read_company_base(&output)
            } else {
                build_company_base(&input, &output)
            }
        }
        Commands::Serve {
            country_csv,
            asn_csv,
            listen,
            ip_version,
        } => serve(&country_csv, &asn_csv, listen, IpVersion::parse(&ip_version)),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn build_country_base(
    input: &PathBuf,
    output: &PathBuf,
    version: IpVersion,
) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("input csv: {}", input.display());
    log::info!("output base: {}", output.display());

    let mut writer = BaseWriter::create(output)?;

    read_prefix_csv(input, COUNTRY_CSV_FIELDS, version, &CancelFlag::new(), |net, cols| {
        writer.add(&CountryRecord::new(net, &cols[1]))?;
        if writer.writes() % PROGRESS_EVERY == 0 {
            log::info!("{} records written", writer.writes());
        }
        Ok(())
    })?;

    let (writes, size) = (writer.writes(), writer.size());
    writer.finish()?;

    log::info!("writing finished: records={writes} size={size}B");
    Ok(())
}

fn read_country_base(
    path: &PathBuf,
    codes: &[String],
    version: IpVersion,
) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("opening country base: {}", path.display());

    let keep: Vec<String> = codes.iter().map(|c| c.to_ascii_uppercase()).collect();

    let mut reader = BaseReader::<CountryRecord>::open(path)?;
    let mut rec = CountryRecord::default();
    let mut shown = 0u64;

    while reader.next(&mut rec)? {
        if !keep.is_empty() && !keep.iter().any(|c| c == rec.code()) {
            continue;
        }
        if !version.accepts(rec.network().addr()) {
            continue;
        }
        shown += 1;
        log::info!("[{}] {} - {}", reader.reads(), rec.code(), rec.network());
    }

    log::info!("reading finished: records={} matched={shown}", reader.reads());
    Ok(())
}

fn build_company_base(input: &PathBuf, output: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("input csv: {}", input.display());
    log::info!("output base: {}", output.display());

    let mut writer = BaseWriter::create(output)?;

    read_prefix_csv(
        input,
        ASN_CSV_FIELDS,
        IpVersion::V4V6,
        &CancelFlag::new(),
        |net, cols| {
            writer.add(&CompanyRecord::new(net, &cols[2], &cols[3]))?;
            if writer.writes() % PROGRESS_EVERY == 0 {
                log::info!("{} records written", writer.writes());
            }
            Ok(())
        },
    )?;

    let (writes, size) = (writer.writes(), writer.size());
    writer.finish()?;

    log::info!("writing finished: records={writes} size={size}B");
    Ok(())
}

fn read_company_base(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("opening company base: {}", path.display());

    let mut reader = BaseReader::<CompanyRecord>::open(path)?;
    let mut rec = CompanyRecord::default();

    while reader.next(&mut rec)? {
        log::info!(
            "[{}] {} - {} / {}",
            reader.reads(),
            rec.network(),
            rec.name(),
            rec.org()
        );
    }

    log::info!("reading finished: records={}", reader.reads());
    Ok(())
}

fn serve(
    country_csv: &PathBuf,
    asn_csv: &PathBuf,
    listen: SocketAddr,
    version: IpVersion,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = IpRegistry::from_csv(country_csv, asn_csv, version, &CancelFlag::new())?;
    log::info!("registry ready: {} ranges", registry.size());

    let state = Arc::new(AppState {
        service: LookupService::new(Arc::new(registry), Arc::new(NoopCache)),
    });

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(http::serve(listen, state))?;
    Ok(())
}
