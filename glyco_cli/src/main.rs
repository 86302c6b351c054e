use chrono::{Local, NaiveDate, NaiveTime, Timelike};
use clap::{Args, Parser, Subcommand, ValueEnum};
use glyco_core::dashboard::DashboardSummary;
use glyco_core::*;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "glyco")]
#[command(about = "Personal glucose log and statistics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Profile to work on (remembered for later runs)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Reference day for windowed statistics (defaults to the local date)
    #[arg(long, global = true, hide = true)]
    today: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a new entry
    Add(EntryFields),

    /// Correct an existing entry
    Edit {
        id: Uuid,

        #[command(flatten)]
        fields: EntryFields,

        /// Remove a stored value (repeatable)
        #[arg(long, value_enum)]
        clear: Vec<ClearField>,
    },

    /// Delete an entry
    Delete { id: Uuid },

    /// List entries, newest first
    List {
        /// Only entries from the last N days
        #[arg(long)]
        days: Option<u32>,
    },

    /// Show the statistics dashboard (default)
    Stats {
        /// Print the dashboard as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the medication catalog
    Meds {
        #[command(subcommand)]
        command: MedsCommand,
    },

    /// Export the journal as CSV
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Write a JSON backup of the journal and medication catalog
    Backup {
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Restore a JSON backup
    Restore { path: PathBuf },
}

#[derive(Args)]
struct EntryFields {
    /// Day of the reading (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Time of the reading (HH:MM)
    #[arg(long, value_parser = parse_time)]
    time: Option<NaiveTime>,

    /// matin/midi/soir/divers (or morning/midday/evening/other)
    #[arg(long, value_parser = parse_category)]
    category: Option<Category>,

    /// Blood glucose in g/L
    #[arg(long)]
    glycemia: Option<f64>,

    /// Rapid-acting insulin units
    #[arg(long)]
    rapid: Option<f64>,

    /// Basal insulin units
    #[arg(long)]
    basal: Option<f64>,

    #[arg(long)]
    notes: Option<String>,

    /// Medication taken, by catalog name or id (repeatable)
    #[arg(long = "med")]
    meds: Vec<String>,
}

/// Optional entry values that `edit --clear` can remove
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ClearField {
    Glycemia,
    Rapid,
    Basal,
    Notes,
}

#[derive(Subcommand)]
enum MedsCommand {
    /// Show the catalog for every category
    List,

    /// Add a medication to a category
    Add {
        #[arg(long, value_parser = parse_category)]
        category: Category,

        name: String,

        #[arg(long, default_value = "")]
        dose: String,

        /// Pre-select it when logging entries
        #[arg(long)]
        taken: bool,
    },

    /// Change a medication's name, dose or taken flag
    Edit {
        #[arg(long, value_parser = parse_category)]
        category: Category,

        id: Uuid,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        dose: Option<String>,

        #[arg(long)]
        taken: Option<bool>,
    },

    /// Remove a medication
    Remove {
        #[arg(long, value_parser = parse_category)]
        category: Category,

        id: Uuid,
    },

    /// Flip the taken flag (or set it with --taken true|false)
    Toggle {
        #[arg(long, value_parser = parse_category)]
        category: Category,

        id: Uuid,

        #[arg(long)]
        taken: Option<bool>,
    },
}

/// Everything a command needs, resolved once per run
struct Context {
    data_dir: PathBuf,
    user: String,
    today: NaiveDate,
    config: Config,
}

impl Context {
    fn entries(&self) -> Result<EntryStore> {
        EntryStore::for_user(&self.data_dir, &self.user)
    }

    fn medications(&self) -> Result<MedicationStore> {
        MedicationStore::for_user(&self.data_dir, &self.user)
    }
}

fn main() -> Result<()> {
    // Initialize logging
    glyco_core::logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());

    // Explicit --user wins and is remembered; otherwise the last one used
    let user = match cli.user {
        Some(user) => {
            save_last_user(&data_dir, &user)?;
            user.trim().to_string()
        }
        None => load_last_user(&data_dir)?.unwrap_or_else(|| config.user.default_user.clone()),
    };
    tracing::debug!("Using data dir {:?} for user {}", data_dir, user);

    let ctx = Context {
        data_dir,
        user,
        today,
        config,
    };

    match cli.command.unwrap_or(Commands::Stats { json: false }) {
        Commands::Add(fields) => cmd_add(&ctx, fields),
        Commands::Edit { id, fields, clear } => cmd_edit(&ctx, id, fields, &clear),
        Commands::Delete { id } => cmd_delete(&ctx, id),
        Commands::List { days } => cmd_list(&ctx, days),
        Commands::Stats { json } => cmd_stats(&ctx, json),
        Commands::Meds { command } => cmd_meds(&ctx, command),
        Commands::Export { output } => cmd_export(&ctx, output),
        Commands::Backup { output } => cmd_backup(&ctx, output),
        Commands::Restore { path } => cmd_restore(&ctx, path),
    }
}

fn cmd_add(ctx: &Context, fields: EntryFields) -> Result<()> {
    validate_amounts(&fields)?;

    let date = fields.date.unwrap_or(ctx.today);
    let time = fields.time.unwrap_or_else(current_minute);
    let category = fields.category.unwrap_or(Category::Morning);

    let catalog = ctx.medications()?.load()?;
    let medications = if fields.meds.is_empty() {
        catalog.snapshot_taken(&category)
    } else {
        select_medications(&catalog, &category, &fields.meds)?
    };

    let mut entry = Entry::new(date, time, category);
    entry.glycemia = fields.glycemia;
    entry.rapid_insulin = fields.rapid;
    entry.basal_insulin = fields.basal;
    entry.notes = fields.notes.filter(|n| !n.trim().is_empty());
    entry.medications = medications;

    let entry = ctx.entries()?.add(entry)?;

    println!("✓ Entry added");
    println!("  {}", format_entry(&entry));
    Ok(())
}

fn cmd_edit(ctx: &Context, id: Uuid, fields: EntryFields, clear: &[ClearField]) -> Result<()> {
    validate_amounts(&fields)?;

    let conflicts = [
        (ClearField::Glycemia, fields.glycemia.is_some()),
        (ClearField::Rapid, fields.rapid.is_some()),
        (ClearField::Basal, fields.basal.is_some()),
        (ClearField::Notes, fields.notes.is_some()),
    ];
    for (field, set) in conflicts {
        if set && clear.contains(&field) {
            return Err(Error::Validation(format!(
                "cannot both set and clear {:?}",
                field
            )));
        }
    }

    let store = ctx.entries()?;
    let existing = store
        .get(id)?
        .ok_or_else(|| Error::NotFound(format!("entry {}", id)))?;

    let medications = if fields.meds.is_empty() {
        None
    } else {
        let category = fields.category.as_ref().unwrap_or(&existing.category);
        let catalog = ctx.medications()?.load()?;
        Some(select_medications(&catalog, category, &fields.meds)?)
    };

    // A cleared field patches to `Some(None)`
    let value = |field: ClearField, new: Option<f64>| {
        if clear.contains(&field) {
            Some(None)
        } else {
            new.map(Some)
        }
    };

    let patch = EntryPatch {
        date: fields.date,
        time: fields.time,
        category: fields.category,
        glycemia: value(ClearField::Glycemia, fields.glycemia),
        rapid_insulin: value(ClearField::Rapid, fields.rapid),
        basal_insulin: value(ClearField::Basal, fields.basal),
        medications,
        notes: if clear.contains(&ClearField::Notes) {
            Some(None)
        } else {
            fields.notes.map(Some)
        },
    };
    if patch.is_empty() {
        return Err(Error::Validation("nothing to change".into()));
    }

    let entry = store
        .update(id, patch)?
        .ok_or_else(|| Error::NotFound(format!("entry {}", id)))?;

    println!("✓ Entry updated");
    println!("  {}", format_entry(&entry));
    Ok(())
}

fn cmd_delete(ctx: &Context, id: Uuid) -> Result<()> {
    if !ctx.entries()?.delete(id)? {
        return Err(Error::NotFound(format!("entry {}", id)));
    }
    println!("✓ Entry deleted");
    Ok(())
}

fn cmd_list(ctx: &Context, days: Option<u32>) -> Result<()> {
    let entries = ctx.entries()?.load()?;
    let cutoff = days.and_then(|d| stats::window_start(ctx.today, d.max(1)));

    let shown: Vec<&Entry> = entries
        .iter()
        .filter(|e| cutoff.map_or(true, |c| e.date >= c && e.date <= ctx.today))
        .collect();

    if shown.is_empty() {
        println!("No entries.");
        return Ok(());
    }

    for entry in shown {
        println!("{}", format_entry(entry));
    }
    Ok(())
}

fn cmd_stats(ctx: &Context, json: bool) -> Result<()> {
    let entries = ctx.entries()?.load()?;
    let summary = DashboardSummary::compute(&entries, ctx.today, &ctx.config.dashboard);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        display_dashboard(&ctx.user, &summary);
    }
    Ok(())
}

fn cmd_meds(ctx: &Context, command: MedsCommand) -> Result<()> {
    let store = ctx.medications()?;

    match command {
        MedsCommand::List => {
            let catalog = store.load()?;
            for category in Category::FIXED {
                println!("{}", category);
                let meds = catalog.list(&category);
                if meds.is_empty() {
                    println!("  (none)");
                }
                for med in meds {
                    println!(
                        "  [{}] {} {}  {}",
                        if med.taken { "x" } else { " " },
                        med.name,
                        med.dose,
                        med.id
                    );
                }
            }
        }

        MedsCommand::Add {
            category,
            name,
            dose,
            taken,
        } => {
            let med = store.update(|c| c.add(&category, &name, &dose, taken))?;
            println!("✓ Medication added ({}): {}", category, med.id);
        }

        MedsCommand::Edit {
            category,
            id,
            name,
            dose,
            taken,
        } => {
            let patch = MedicationPatch { name, dose, taken };
            store
                .update(|c| c.update(&category, id, patch))?
                .ok_or_else(|| Error::NotFound(format!("medication {}", id)))?;
            println!("✓ Medication updated");
        }

        MedsCommand::Remove { category, id } => {
            if !store.update(|c| Ok(c.remove(&category, id)))? {
                return Err(Error::NotFound(format!("medication {}", id)));
            }
            println!("✓ Medication removed");
        }

        MedsCommand::Toggle {
            category,
            id,
            taken,
        } => {
            let med = store
                .update(|c| Ok(c.toggle_taken(&category, id, taken)))?
                .ok_or_else(|| Error::NotFound(format!("medication {}", id)))?;
            println!(
                "✓ {} ({}) marked {}",
                med.name,
                category,
                if med.taken { "taken" } else { "not taken" }
            );
        }
    }

    Ok(())
}

fn cmd_export(ctx: &Context, output: Option<PathBuf>) -> Result<()> {
    let entries = ctx.entries()?.load()?;
    let path = output.unwrap_or_else(|| {
        PathBuf::from(export::default_export_file_name(&ctx.user, ctx.today))
    });

    let count = export_entries_csv(&entries, &path)?;
    println!("✓ Exported {} entries", count);
    println!("  CSV: {}", path.display());
    Ok(())
}

fn cmd_backup(ctx: &Context, output: Option<PathBuf>) -> Result<()> {
    let path = output.unwrap_or_else(|| {
        PathBuf::from(backup::default_backup_file_name(&ctx.user, ctx.today))
    });

    let snapshot = Backup::capture(&ctx.data_dir, &ctx.user)?;
    snapshot.write_to(&path)?;
    println!("✓ Backup written ({} entries)", snapshot.entries.len());
    println!("  File: {}", path.display());
    Ok(())
}

fn cmd_restore(ctx: &Context, path: PathBuf) -> Result<()> {
    let snapshot = Backup::read_from(&path)?;
    let user = snapshot.restore(&ctx.data_dir, &ctx.user)?;
    println!("✓ Restored {} entries for {}", snapshot.entries.len(), user);
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn validate_amounts(fields: &EntryFields) -> Result<()> {
    let amounts = [
        ("glycemia", fields.glycemia),
        ("rapid", fields.rapid),
        ("basal", fields.basal),
    ];
    for (name, value) in amounts {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(Error::Validation(format!(
                    "--{} must be a non-negative number",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn select_medications(
    catalog: &MedicationCatalog,
    category: &Category,
    keys: &[String],
) -> Result<Vec<MedicationSnapshot>> {
    keys.iter()
        .map(|key| {
            let med = catalog.find(category, key).ok_or_else(|| {
                Error::NotFound(format!("medication {:?} in {}", key, category))
            })?;
            let mut snapshot = med.snapshot();
            snapshot.taken = true;
            Ok(snapshot)
        })
        .collect()
}

fn current_minute() -> NaiveTime {
    let now = Local::now().time();
    NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(NaiveTime::MIN)
}

fn parse_time(s: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("expected HH:MM, got {:?}", s))
}

fn parse_category(s: &str) -> std::result::Result<Category, String> {
    match Category::from_label(s) {
        Category::Unknown(label) => Err(format!(
            "unknown category {:?} (expected matin, midi, soir or divers)",
            label
        )),
        category => Ok(category),
    }
}

fn fmt_value(value: Option<f64>) -> String {
    value.map_or_else(|| "—".to_string(), |v| format!("{:.2}", v))
}

fn format_entry(entry: &Entry) -> String {
    let mut line = format!(
        "{} {} {:<7} {:>5} g/L",
        entry.date,
        entry.time.format("%H:%M"),
        entry.category.label(),
        fmt_value(entry.reading())
    );
    if let Some(units) = entry.rapid_insulin {
        line.push_str(&format!("  rapid {}U", units));
    }
    if let Some(units) = entry.basal_insulin {
        line.push_str(&format!("  basal {}U", units));
    }
    if !entry.medications.is_empty() {
        let names: Vec<&str> = entry.medications.iter().map(|m| m.name.as_str()).collect();
        line.push_str(&format!("  [{}]", names.join(", ")));
    }
    if let Some(notes) = &entry.notes {
        line.push_str(&format!("  \"{}\"", notes));
    }
    line.push_str(&format!("  {}", entry.id));
    line
}

fn display_dashboard(user: &str, summary: &DashboardSummary) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  GLYCO DASHBOARD · {} · {}", user, summary.today);
    println!("╰─────────────────────────────────────────╯");
    println!();

    if summary.total_entries == 0 {
        println!("  No data to display yet.");
        println!();
    }

    let averages: Vec<String> = summary
        .averages
        .iter()
        .map(|a| format!("{}d {}", a.days, fmt_value(a.average)))
        .collect();
    println!("  Average (g/L):  {}", averages.join("   "));

    let t = &summary.by_time_window;
    println!(
        "  By time:        morning {}  midday {}  evening {}  night {}",
        fmt_value(t.morning),
        fmt_value(t.midday),
        fmt_value(t.evening),
        fmt_value(t.night)
    );

    let mut by_category: Vec<String> = Category::FIXED
        .iter()
        .map(|c| format!("{} {}", c, fmt_value(summary.by_category.get(c))))
        .collect();
    by_category.extend(
        summary
            .by_category
            .unknown
            .iter()
            .map(|(label, avg)| format!("{} {}", label, fmt_value(*avg))),
    );
    println!("  By category:    {}", by_category.join("  "));

    for spread in &summary.spreads {
        println!(
            "  {:>2}d min/max:    {} / {}   σ {}",
            spread.days,
            fmt_value(spread.min),
            fmt_value(spread.max),
            fmt_value(spread.std_dev)
        );
    }

    let d = &summary.distribution;
    println!(
        "  Zones (30d):    hypo {}%  target {}%  hyper {}%",
        d.hypo, d.target, d.hyper
    );
    println!(
        "  Trend:          {} {:+.4} per reading",
        summary.trend.direction.symbol(),
        summary.trend.slope
    );
    println!("  Glyco score:    {}/100", summary.glyco_score);
    println!(
        "  Est. A1c:       {}",
        summary
            .estimated_a1c
            .map_or_else(|| "—".to_string(), |a| format!("{:.2}%", a))
    );

    println!();
    for day in &summary.daily {
        println!("  {}  {}", day.date.format("%a %d"), fmt_value(day.average));
    }
    println!();
}
