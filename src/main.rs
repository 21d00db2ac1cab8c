use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use uuid::Uuid;

use medtime::config::Config;
use medtime::daemon::run_daemon;
use medtime::database::JsonStore;
use medtime::desktop::DesktopDispatcher;
use medtime::logging::init_logging;
use medtime::model::{DependentId, Medicine};
use medtime::service::{MedicineEdit, NewDependent, NewMedicine, Tracker};
use medtime::session::{ConfiguredUser, Session, SystemClock};
use medtime::{MedError, Result};

type CliTracker = Tracker<JsonStore, DesktopDispatcher>;

#[derive(Parser)]
#[command(name = "medtime")]
#[command(
    about = "Medication reminders and adherence tracking",
    long_about = "Keep track of your medicines and the people you care for: daily reminders, a calendar of doses taken, and your adherence over time."
)]
#[command(version)]
struct Cli {
    /// Account the records belong to
    #[arg(short, long, global = true, env = "MEDTIME_USER")]
    user: Option<String>,
    /// Records file (default: ~/.medtime.json)
    #[arg(long, global = true, env = "MEDTIME_DATA")]
    data_file: Option<PathBuf>,
    /// Seconds between daemon checks
    #[arg(long, global = true, env = "MEDTIME_POLL_SECS", hide = true)]
    poll_secs: Option<u64>,
    /// Set to "off" to refuse notification registrations
    #[arg(long, global = true, env = "MEDTIME_NOTIFICATIONS", hide = true)]
    notifications: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new medicine
    #[command(visible_aliases = ["a", "ad"])]
    Add {
        /// Name of the medicine
        name: String,
        /// Dosage (e.g., "500mg", "10ml")
        #[arg(short, long)]
        dose: String,
        /// Time to take, 24-hour or 12-hour (e.g., "08:00", "8:30 PM")
        #[arg(short, long)]
        time: String,
        /// Optional notes
        #[arg(short, long)]
        notes: Option<String>,
        /// Dependent this medicine is for (name or id)
        #[arg(long)]
        dependent: Option<String>,
    },
    /// Edit an existing medicine
    #[command(visible_alias = "e")]
    Edit {
        /// Name or id of the medicine to edit
        name: String,
        /// New name
        #[arg(long)]
        rename: Option<String>,
        /// New dosage
        #[arg(long)]
        dose: Option<String>,
        /// New time to take
        #[arg(long)]
        time: Option<String>,
        /// New notes (use empty string to clear)
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a medicine and cancel its reminder
    #[command(visible_alias = "r")]
    Remove { name: String },
    /// List medicines
    #[command(visible_aliases = ["l", "s", "show"])]
    List,
    /// Show the medicine due next
    #[command(visible_alias = "n")]
    Next,
    /// Turn the daily reminder for a medicine on or off
    Remind {
        name: String,
        #[arg(value_enum)]
        state: Switch,
    },
    /// Mark a medicine as taken (today unless --date is given)
    #[command(visible_alias = "t")]
    Take {
        name: String,
        /// Day to mark, as YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show the days a medicine was taken
    #[command(visible_alias = "c")]
    Calendar { name: String },
    /// Show adherence
    #[command(visible_alias = "h")]
    Adherence {
        /// Only the last N days (default: since the first medicine was added)
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Manage dependents
    #[command(subcommand)]
    Dependent(DependentCommand),
    /// Start the background daemon for reminders
    #[command(visible_alias = "d")]
    Daemon,
}

#[derive(Subcommand)]
enum DependentCommand {
    /// Add a dependent
    Add {
        name: String,
        /// e.g. "son", "mother"
        #[arg(short, long)]
        relationship: String,
        #[arg(short, long)]
        email: String,
    },
    /// List dependents
    List,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    let config = Config::resolve(cli.data_file, cli.user, cli.poll_secs, cli.notifications.as_deref());

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_informational() => {
            println!("{err}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            debug!(?err, "command failed");
            eprintln!("Error: {err}");
            if matches!(err, MedError::Auth(_)) {
                eprintln!("Pick an account with --user <NAME> or MEDTIME_USER.");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, config: &Config) -> Result<()> {
    let auth = ConfiguredUser(config.user.clone());
    if let Commands::Daemon = command {
        return run_daemon(config, &auth, &SystemClock);
    }

    let session = Session::establish(&auth, &SystemClock)?;
    let store = JsonStore::open(&config.data_file)?;
    let mut tracker = Tracker::new(store, DesktopDispatcher::new(config.notifications));

    match command {
        Commands::Add {
            name,
            dose,
            time,
            notes,
            dependent,
        } => {
            let dependent = dependent
                .map(|key| find_dependent(&tracker, &session, &key))
                .transpose()?;
            let med = tracker.add_medicine(
                &session,
                NewMedicine {
                    name,
                    dose,
                    schedule: time,
                    notes,
                    dependent,
                },
            )?;
            println!("Added medicine: {} ({} at {})", med.name, med.dose, med.schedule);
            println!("  Turn on reminders with: medtime remind \"{}\" on", med.name);
        }
        Commands::Edit {
            name,
            rename,
            dose,
            time,
            notes,
        } => {
            let med = tracker.find_medicine(&session, &name)?;
            let edit = MedicineEdit {
                name: rename,
                dose,
                schedule: time,
                notes,
            };
            let updated = tracker.edit_medicine(&session, &med.id, edit)?;
            println!("Updated '{}'", updated.name);
            print_medicine(&updated);
        }
        Commands::Remove { name } => {
            let med = tracker.find_medicine(&session, &name)?;
            tracker.delete_medicine(&session, &med.id)?;
            println!("Removed medicine: {}", med.name);
        }
        Commands::List => list_medicines(&tracker, &session)?,
        Commands::Next => match tracker.next_dose(&session)? {
            Some(next) => {
                let when = if next.tomorrow { "tomorrow" } else { "today" };
                println!("Next: {} ({}) {} at {}", next.medicine.name, next.medicine.dose, when, next.at);
            }
            None => println!("No medicines yet."),
        },
        Commands::Remind { name, state } => {
            let med = tracker.find_medicine(&session, &name)?;
            let enabled = matches!(state, Switch::On);
            tracker.set_notifications(&session, &med.id, enabled)?;
            if enabled {
                println!("Reminder for {} set for every day at {}", med.name, med.scheduled_at()?);
                println!("  Keep `medtime daemon` running to receive it.");
            } else {
                println!("Reminder for {} turned off", med.name);
            }
        }
        Commands::Take { name, date } => {
            let med = tracker.find_medicine(&session, &name)?;
            let event = tracker.mark_taken(&session, &med.id, date)?;
            println!("Marked '{}' as taken on {}", med.name, event.date);
        }
        Commands::Calendar { name } => {
            let med = tracker.find_medicine(&session, &name)?;
            let days = tracker.calendar(&session, &med.id)?;
            if days.is_empty() {
                println!("{} - no doses recorded", med.name);
            } else {
                println!("\n{} - Taken on", med.name);
                println!("{}", "=".repeat(60));
                for day in days.iter().rev() {
                    println!("  {}", day.format("%Y-%m-%d (%a)"));
                }
                println!();
            }
        }
        Commands::Adherence { days } => {
            let summary = tracker.adherence(&session, days)?;
            match days {
                Some(d) => println!("Adherence over the last {d} day(s): {}%", summary.percent),
                None => println!("Adherence: {}%", summary.percent),
            }
            println!("  Doses taken: {} (Expected: {})", summary.taken, summary.expected);
        }
        Commands::Dependent(DependentCommand::Add {
            name,
            relationship,
            email,
        }) => {
            let dependent = tracker.add_dependent(
                &session,
                NewDependent {
                    name,
                    relationship,
                    email,
                },
            )?;
            println!("Added dependent: {} ({})", dependent.name, dependent.relationship);
        }
        Commands::Dependent(DependentCommand::List) => {
            let dependents = tracker.dependents(&session)?;
            if dependents.is_empty() {
                println!("No dependents found.");
            }
            for dependent in dependents {
                println!("{} ({}) <{}>", dependent.name, dependent.relationship, dependent.email);
            }
        }
        Commands::Daemon => unreachable!("handled above"),
    }

    Ok(())
}

fn find_dependent(tracker: &CliTracker, session: &Session, key: &str) -> Result<DependentId> {
    let dependents = tracker.dependents(session)?;
    let by_id = Uuid::parse_str(key.trim()).ok().map(DependentId);
    dependents
        .iter()
        .find(|d| Some(d.id) == by_id || d.name.to_lowercase() == key.trim().to_lowercase())
        .map(|d| d.id)
        .ok_or_else(|| MedError::InvalidInput(format!("dependent '{key}' not found")))
}

fn list_medicines(tracker: &CliTracker, session: &Session) -> Result<()> {
    let medicines = tracker.medicines(session)?;
    if medicines.is_empty() {
        println!("No medicines found.");
        return Ok(());
    }

    let dependents = tracker.dependents(session)?;
    println!("\nMedicines:");
    println!("{}", "=".repeat(60));
    for med in &medicines {
        print_medicine(med);
        if let Some(dependent) = med
            .dependent_id
            .and_then(|id| dependents.iter().find(|d| d.id == id))
        {
            println!("  For:      {} ({})", dependent.name, dependent.relationship);
        }
    }
    println!();
    Ok(())
}

fn print_medicine(med: &Medicine) {
    println!("\n{}", med.name);
    println!("  Dose:     {}", med.dose);
    println!("  Time:     {}", med.schedule);
    println!(
        "  Reminder: {}",
        if med.notifications_enabled() { "on" } else { "off" }
    );
    if let Some(notes) = &med.notes {
        println!("  Notes:    {}", notes);
    }
}
