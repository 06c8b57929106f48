use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use jiff::civil::Date;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use namescreen_core::{
    DEFAULT_THRESHOLD, Gender, SearchOptions, SubjectLists, build_index, search,
};

mod output;

use output::ColorMode;

/// Sanctions screening - phonetic fuzzy name matching against watchlists
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ListFormat {
    /// EU consolidated financial sanctions list
    Eu,
    /// OFAC SDN advanced list
    Ofac,
}

impl ListFormat {
    fn reference_prefix(self) -> &'static str {
        match self {
            Self::Eu => "EU",
            Self::Ofac => "OFAC",
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Screen a single name against a sanctions list
    Query {
        /// Path to the sanctions list XML file
        list: PathBuf,

        /// Name to screen
        name: String,

        /// List file format
        #[arg(long, value_enum, default_value_t = ListFormat::Eu)]
        format: ListFormat,

        /// Search the entity index instead of the person index
        #[arg(long)]
        entities: bool,

        /// Gender code (M or F)
        #[arg(long)]
        gender: Option<String>,

        /// Exact birthdate (YYYY-MM-DD)
        #[arg(long)]
        birthdate: Option<String>,

        /// Minimum similarity score
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: u32,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Screen a batch of customers from a semicolon-separated file
    Batch {
        /// Path to the sanctions list XML file
        list: PathBuf,

        /// Query file with header firstname;lastname;birthdate;gender;id;customer_type
        queries: PathBuf,

        /// List file format
        #[arg(long, value_enum, default_value_t = ListFormat::Eu)]
        format: ListFormat,

        /// Minimum similarity score
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: u32,

        /// Write pipe-separated results here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report corpus statistics for a list
    Stats {
        /// Path to the sanctions list XML file
        list: PathBuf,

        /// List file format
        #[arg(long, value_enum, default_value_t = ListFormat::Eu)]
        format: ListFormat,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Query {
            list,
            name,
            format,
            entities,
            gender,
            birthdate,
            threshold,
            json,
            no_color,
        } => query(
            &list, &name, format, entities, gender, birthdate, threshold, json, no_color,
        ),
        Command::Batch {
            list,
            queries,
            format,
            threshold,
            output,
        } => batch(&list, &queries, format, threshold, output),
        Command::Stats { list, format } => stats(&list, format),
    }
}

fn load_lists(path: &Path, format: ListFormat) -> anyhow::Result<SubjectLists> {
    let started = Instant::now();
    let lists = match format {
        ListFormat::Eu => namescreen_eu::load_file(path)
            .with_context(|| format!("failed to load EU list from {}", path.display()))?,
        ListFormat::Ofac => namescreen_ofac::load_file(path)
            .with_context(|| format!("failed to load OFAC list from {}", path.display()))?,
    };
    tracing::info!(elapsed = ?started.elapsed(), "list loaded");
    Ok(lists)
}

fn parse_gender(code: Option<&str>) -> anyhow::Result<Option<Gender>> {
    match code {
        None => Ok(None),
        Some(code) => Gender::from_code(code)
            .map(Some)
            .with_context(|| format!("unrecognized gender code '{}', expected M or F", code)),
    }
}

fn parse_birthdate(raw: Option<&str>) -> anyhow::Result<Option<Date>> {
    match raw {
        None => Ok(None),
        Some(raw) => raw
            .parse::<Date>()
            .map(Some)
            .with_context(|| format!("invalid birthdate '{}', expected YYYY-MM-DD", raw)),
    }
}

fn query(
    list: &Path,
    name: &str,
    format: ListFormat,
    entities: bool,
    gender: Option<String>,
    birthdate: Option<String>,
    threshold: u32,
    json: bool,
    no_color: bool,
) -> anyhow::Result<()> {
    let lists = load_lists(list, format)?;
    let store = if entities {
        &lists.entities
    } else {
        &lists.persons
    };
    let (index, _) = build_index(store);

    let options = SearchOptions {
        gender: parse_gender(gender.as_deref())?,
        birthdate: parse_birthdate(birthdate.as_deref())?,
        threshold,
    };

    let started = Instant::now();
    let matches = search(name, &index, store, &options);
    tracing::debug!(elapsed = ?started.elapsed(), matches = matches.len(), "query complete");

    let mut stdout = std::io::stdout();
    if json {
        serde_json::to_writer_pretty(&mut stdout, &matches)?;
        writeln!(stdout)?;
    } else {
        output::print_matches(&mut stdout, name, &matches, ColorMode(!no_color))?;
    }
    Ok(())
}

/// One row of the batch query file.
#[derive(Debug, Deserialize)]
struct QueryRow {
    firstname: String,
    lastname: String,
    birthdate: String,
    gender: String,
    id: String,
    customer_type: String,
}

fn batch(
    list: &Path,
    queries: &Path,
    format: ListFormat,
    threshold: u32,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let lists = load_lists(list, format)?;
    let (index, _) = build_index(&lists.persons);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_path(queries)
        .with_context(|| format!("failed to open query file {}", queries.display()))?;
    let rows: Vec<QueryRow> = reader
        .deserialize()
        .collect::<Result<_, _>>()
        .context("malformed query file")?;

    let out: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };
    let mut writer = csv::WriterBuilder::new().delimiter(b'|').from_writer(out);
    writer.write_record([
        "id",
        "name",
        "matched_alias",
        "list_ref",
        "customer_type",
        "score",
    ])?;

    let progress = ProgressBar::new(rows.len() as u64).with_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}").expect("valid template"),
    );

    let started = Instant::now();
    let mut screened = 0usize;
    let mut flagged = 0usize;
    let mut records = 0usize;

    for row in &rows {
        let whole_name = format!("{} {}", row.firstname, row.lastname);
        let options = SearchOptions {
            gender: Gender::from_code(&row.gender),
            birthdate: row.birthdate.parse::<Date>().ok(),
            threshold,
        };
        let matches = search(&whole_name, &index, &lists.persons, &options);

        if !matches.is_empty() {
            flagged += 1;
        }
        for m in &matches {
            records += 1;
            writer.write_record([
                row.id.as_str(),
                whole_name.as_str(),
                m.alias.full_name().as_str(),
                format!("{}_{}", format.reference_prefix(), m.subject_id).as_str(),
                row.customer_type.as_str(),
                format!("{:.2}", m.score).as_str(),
            ])?;
        }
        screened += 1;
        progress.inc(1);
    }

    writer.flush()?;
    progress.finish_and_clear();

    let elapsed = started.elapsed();
    eprintln!(
        "Screened {} customers: {} flagged with {} candidate records in {:.2?} ({:.0} queries/s)",
        screened,
        flagged,
        records,
        elapsed,
        screened as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
    );
    Ok(())
}

fn stats(list: &Path, format: ListFormat) -> anyhow::Result<()> {
    let lists = load_lists(list, format)?;

    let mut stdout = std::io::stdout();
    for (label, store) in [("persons", &lists.persons), ("entities", &lists.entities)] {
        let (index, stop_words) = build_index(store);
        writeln!(stdout, "{label}: {} subjects", store.len())?;
        writeln!(stdout, "  stop-words: {}", stop_words.len())?;
        writeln!(stdout, "  phonetic bins: {}", index.len())?;
        match index.largest_bin() {
            Some((key, count)) => {
                writeln!(stdout, "  largest bin: {key} with {count} postings")?
            }
            None => writeln!(stdout, "  largest bin: none")?,
        }
    }
    Ok(())
}
