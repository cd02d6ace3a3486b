use anyhow::{Context as _, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use stockbook::auth::{RequestContext, Role, UserDirectory};
use stockbook::catalog;
use stockbook::config::Settings;
use stockbook::importer::{self, FieldMapping};
use stockbook::registry::view::{self, ListFilter};
use stockbook::registry::{NewRecord, RecordPatch, Registry, UpdateOutcome};

#[derive(Parser)]
#[command(name = "stockbook", about = "Inventory records for a tasting club")]
pub struct Cli {
    /// Acting user name; its role comes from the user directory
    #[arg(long, global = true, env = "STOCKBOOK_USER", default_value = "guest")]
    pub user: String,

    /// Directory holding the item and log files (overrides the settings file)
    #[arg(long, global = true, env = "STOCKBOOK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show a file's columns, dtypes and first rows
    Inspect {
        /// Path to the file (CSV, Parquet, JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Number of preview rows
        #[arg(long, default_value_t = 10)]
        rows: u32,
    },
    /// Guess the canonical field mapping for a file's columns
    Guess {
        /// Path to the file (CSV, Parquet, JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Write the guessed mapping to this JSON file for later editing
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Normalize a raw file and replace the item store with it
    Import {
        /// Path to the file (CSV, Parquet, JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Mapping JSON file; guessed from the columns when omitted
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// Column whose non-empty cells mark the category; repeatable.
        /// Defaults to the known style columns present in the file.
        #[arg(long = "style", value_name = "COLUMN")]
        style_columns: Vec<String>,
    },
    /// Show stored records
    List {
        /// Exact member name
        #[arg(long)]
        member: Option<String>,

        /// Raw meeting value
        #[arg(long)]
        meeting: Option<String>,

        /// Free word matched against name, category, producer, region and member
        #[arg(short, long)]
        query: Option<String>,

        /// Use display labels and formatted values
        #[arg(long)]
        pretty: bool,
    },
    /// Append one record
    Add {
        /// Record name
        #[arg(long)]
        name: String,

        /// Member who brought it
        #[arg(long)]
        member: String,

        /// Category, e.g. 純米吟醸
        #[arg(long)]
        category: Option<String>,

        #[arg(long, default_value_t = 0)]
        quantity: i64,

        #[arg(long)]
        producer: Option<String>,

        #[arg(long)]
        region: Option<String>,

        #[arg(long)]
        polish_ratio: Option<String>,

        #[arg(long)]
        note: Option<String>,

        #[arg(long)]
        meeting_no: Option<String>,

        #[arg(long)]
        meeting_at: Option<String>,

        /// Record date (YYYY-MM-DD); "now" when omitted
        #[arg(long)]
        date: Option<String>,
    },
    /// Change fields of one stored record
    Update {
        #[arg(long)]
        id: i64,

        /// FIELD=VALUE pair, repeatable
        #[arg(short, long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },
    /// Remove one stored record
    Delete {
        #[arg(long)]
        id: i64,
    },
    /// Merge an edited copy of the item table back into the store
    BulkEdit {
        /// Edited table (CSV, Parquet, JSON) with an id column
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Show recent audit entries, newest first
    History {
        /// Maximum number of entries
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

pub fn run_command(cli: Cli) -> Result<()> {
    let mut settings = Settings::load()?;
    if let Some(dir) = cli.data_dir {
        settings = settings.with_data_dir(dir);
    }

    let directory = UserDirectory::load(&settings.users_path()?);
    let role = directory.role_of(&cli.user).unwrap_or(Role::User);
    let ctx = RequestContext::new(cli.user, role);

    match cli.command {
        Commands::Inspect { file, rows } => handle_inspect(&file, rows),
        Commands::Guess { file, out } => handle_guess(&file, out.as_deref()),
        Commands::Import {
            file,
            mapping,
            style_columns,
        } => {
            require_admin(&ctx)?;
            handle_import(&settings, &ctx, &file, mapping.as_deref(), &style_columns)
        }
        Commands::List {
            member,
            meeting,
            query,
            pretty,
        } => handle_list(&settings, member, meeting, query, pretty),
        Commands::Add {
            name,
            member,
            category,
            quantity,
            producer,
            region,
            polish_ratio,
            note,
            meeting_no,
            meeting_at,
            date,
        } => {
            let record = NewRecord {
                name,
                member,
                category,
                quantity,
                producer,
                region,
                polish_ratio,
                note,
                meeting_no,
                meeting_at,
                updated_at: date.map(|d| parse_record_date(&d)).transpose()?,
            };
            handle_add(&settings, &ctx, &record)
        }
        Commands::Update { id, set } => {
            require_admin(&ctx)?;
            handle_update(&settings, &ctx, id, &set)
        }
        Commands::Delete { id } => {
            require_admin(&ctx)?;
            handle_delete(&settings, &ctx, id)
        }
        Commands::BulkEdit { file } => {
            require_admin(&ctx)?;
            handle_bulk_edit(&settings, &ctx, &file)
        }
        Commands::History { limit } => {
            require_admin(&ctx)?;
            handle_history(&settings, limit)
        }
    }
}

fn require_admin(ctx: &RequestContext) -> Result<()> {
    if ctx.role.is_admin() {
        Ok(())
    } else {
        anyhow::bail!(
            "'{}' lacks the admin role this command needs (pass --user)",
            ctx.user
        );
    }
}

// Lazy scan: the preview never materializes more than `rows` rows.
fn handle_inspect(file: &Path, rows: u32) -> Result<()> {
    let mut lf = importer::load_df_lazy(file)
        .with_context(|| format!("Failed to open {}", file.display()))?;

    let schema = lf.collect_schema()?;
    println!("{}: {} columns", file.display(), schema.len());
    for (name, dtype) in schema.iter() {
        println!("  {name} ({dtype})");
    }

    let preview = lf.limit(rows).collect()?;
    println!("{preview}");
    Ok(())
}

fn handle_guess(file: &Path, out: Option<&Path>) -> Result<()> {
    let df = importer::load_df(file)
        .with_context(|| format!("Failed to load {}", file.display()))?;
    let columns = column_names(&df);

    let mapping = importer::guess(&columns);
    for field in catalog::canonical_fields() {
        println!("{:>12} <- {}", field, mapping.get(field).unwrap_or("-"));
    }

    let styles = catalog::style_columns_in(&columns);
    if !styles.is_empty() {
        println!("Style columns present: {}", styles.join(", "));
    }

    if let Some(path) = out {
        mapping.save(path)?;
        println!("Mapping written to {}", path.display());
    }
    Ok(())
}

fn handle_import(
    settings: &Settings,
    ctx: &RequestContext,
    file: &Path,
    mapping_path: Option<&Path>,
    style_columns: &[String],
) -> Result<()> {
    let raw = importer::load_df(file)
        .with_context(|| format!("Failed to load {}", file.display()))?;
    let columns = column_names(&raw);

    let mapping = match mapping_path {
        Some(path) => FieldMapping::load(path)?,
        None => importer::guess(&columns),
    };
    let missing = mapping.missing_required();
    if !missing.is_empty() {
        println!("Unmapped required fields, defaults apply: {}", missing.join(", "));
    }

    let styles = if style_columns.is_empty() {
        catalog::style_columns_in(&columns)
    } else {
        style_columns.to_vec()
    };

    let normalized = importer::normalize(&raw, &mapping, &styles)?;
    let registry = Registry::open(settings)?;
    let rows = registry.import(ctx, &normalized)?;
    println!(
        "Imported {rows} rows into {}",
        registry.store().items_path().display()
    );
    Ok(())
}

fn handle_list(
    settings: &Settings,
    member: Option<String>,
    meeting: Option<String>,
    query: Option<String>,
    pretty: bool,
) -> Result<()> {
    let registry = Registry::open(settings)?;
    let total = registry.items()?.height();

    let filter = ListFilter {
        member,
        meeting,
        query,
    };
    let rows = registry.list(&filter)?;

    if pretty {
        println!("{}", view::display_frame(&rows)?);
    } else {
        println!("{rows}");
    }
    println!("{} / {} rows", rows.height(), total);
    Ok(())
}

fn handle_add(settings: &Settings, ctx: &RequestContext, record: &NewRecord) -> Result<()> {
    let registry = Registry::open(settings)?;
    let id = registry.add(ctx, record)?;
    println!("Added record {id}");
    Ok(())
}

fn handle_update(settings: &Settings, ctx: &RequestContext, id: i64, set: &[String]) -> Result<()> {
    let mut patch = RecordPatch::new();
    for pair in set {
        let (field, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected FIELD=VALUE, got '{pair}'"))?;
        patch.set(field, value)?;
    }
    if patch.is_empty() {
        anyhow::bail!("Nothing to change; pass at least one --set FIELD=VALUE");
    }

    let registry = Registry::open(settings)?;
    match registry.update(ctx, id, &patch)? {
        UpdateOutcome::Updated => println!("Updated record {id}"),
        UpdateOutcome::NoChange => println!("No changes for record {id}"),
    }
    Ok(())
}

fn handle_delete(settings: &Settings, ctx: &RequestContext, id: i64) -> Result<()> {
    let registry = Registry::open(settings)?;
    registry.delete(ctx, id)?;
    println!("Deleted record {id}");
    Ok(())
}

fn handle_bulk_edit(settings: &Settings, ctx: &RequestContext, file: &Path) -> Result<()> {
    let edited = importer::load_df(file)
        .with_context(|| format!("Failed to load {}", file.display()))?;

    let registry = Registry::open(settings)?;
    let summary = registry.bulk_edit(ctx, &edited)?;
    println!(
        "{} rows overwritten, {} appended",
        summary.rows, summary.added
    );
    Ok(())
}

fn handle_history(settings: &Settings, limit: Option<usize>) -> Result<()> {
    let registry = Registry::open(settings)?;
    let logs = registry.history(limit.unwrap_or(settings.history_limit))?;
    println!("{logs}");
    println!("{} entries", logs.height());
    Ok(())
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names_str()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn parse_record_date(text: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{text}', expected YYYY-MM-DD"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .context("Date has no midnight representation")?;
    Ok(midnight.and_utc())
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used)]
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_record_date() {
        let dt = parse_record_date("2024-05-01").unwrap();
        assert_eq!(dt.timestamp_millis(), 1_714_521_600_000);
        assert!(parse_record_date("05/01/2024").is_err());
    }

    #[test]
    fn test_require_admin() {
        let admin = RequestContext::new("boss", Role::Admin);
        assert!(require_admin(&admin).is_ok());

        let member = RequestContext::new("guest", Role::User);
        assert!(require_admin(&member).is_err());
    }
}
