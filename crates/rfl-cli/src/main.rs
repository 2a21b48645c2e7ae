use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};

use rfl_ordering::lifecycle::{self, OrderingRecord, ReconcileState};
use rfl_ordering::{Category, OrderingSpec};
use rfl_routeros::RouterOsClient;

mod state;

use state::StateFile;

/// Exit status when at least one ordering is not in place.
const EXIT_DRIFT: u8 = 2;

#[derive(Parser)]
#[command(name = "rfl")]
#[command(about = "RouterOS firewall rule-order reconciler", long_about = None)]
struct Cli {
    /// Layered config paths in merge order (base -> site -> ...)
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the live order of a category, one rule id per line
    List {
        /// filter | nat | mangle | raw
        #[arg(long, value_parser = parse_category)]
        category: Category,
    },

    /// Validate orderings against the appliance. Exits 2 on drift.
    Check {
        #[command(flatten)]
        selection: Selection,
    },

    /// Reorder drifted orderings (all of them with --force)
    Apply {
        #[command(flatten)]
        selection: Selection,

        /// Enforce even when the order is already in place
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Track lifecycle records in this JSON file
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Re-validate stored records and invalidate drifted ones. Exits 2 on drift.
    Refresh {
        #[arg(long)]
        state: PathBuf,
    },

    /// Forget stored records. The appliance is not touched.
    Release {
        #[arg(long)]
        state: PathBuf,
    },
}

/// Orderings to act on: one from the command line, or `/orderings` from config.
#[derive(Args)]
struct Selection {
    /// Category of the ordering given by --rules
    #[arg(long, value_parser = parse_category, requires = "rules")]
    category: Option<Category>,

    /// Desired order, comma separated (e.g. "*3,*1,*2")
    #[arg(long, value_delimiter = ',', requires = "category")]
    rules: Vec<String>,
}

impl Selection {
    fn specs(self, config_json: &Value) -> Result<Vec<OrderingSpec>> {
        if let Some(category) = self.category {
            // `--rules ""` is the empty order.
            let rules = self
                .rules
                .into_iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect();
            return Ok(vec![OrderingSpec::new(category, rules)?]);
        }
        let specs = rfl_config::orderings_from_config(config_json)?;
        if specs.is_empty() {
            bail!("CONFIG_MISSING: no orderings; pass --category/--rules or set /orderings");
        }
        Ok(specs)
    }
}

fn parse_category(s: &str) -> std::result::Result<Category, String> {
    Category::parse(s).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    // Load .env.local if present (dev convenience). Silent when missing.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    // Exit status 2 is reserved for drift, so usage errors exit 1.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let path_refs: Vec<&str> = cli.config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = rfl_config::load_layered_yaml(&path_refs)?;
    let config_json = loaded.config_json;

    match cli.cmd {
        Commands::List { category } => {
            let client = connect(&config_json)?;
            let snapshot = rfl_ordering::fetch(&client, category)?;
            for id in snapshot.ids() {
                println!("{id}");
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Check { selection } => {
            let specs = selection.specs(&config_json)?;
            let client = connect(&config_json)?;

            let mut drifted = 0usize;
            for spec in &specs {
                let satisfied = spec.validate(&client)?;
                println!(
                    "category={} rules={} satisfied={}",
                    spec.category,
                    spec.desired_order.join(","),
                    satisfied
                );
                if !satisfied {
                    drifted += 1;
                }
            }
            Ok(drift_exit(drifted))
        }

        Commands::Apply {
            selection,
            force,
            state,
        } => {
            let specs = selection.specs(&config_json)?;
            let client = connect(&config_json)?;
            match state {
                Some(path) => apply_tracked(&client, &specs, force, path),
                None => apply_untracked(&client, &specs, force),
            }
        }

        Commands::Refresh { state } => {
            let mut file = StateFile::load(&state)?;
            if file.records.is_empty() {
                warn!(path = %state.display(), "no records to refresh");
                return Ok(ExitCode::SUCCESS);
            }
            let client = connect(&config_json)?;

            let mut drifted = 0usize;
            let mut refreshed = Vec::with_capacity(file.records.len());
            for record in &file.records {
                let (record, st) = lifecycle::read(&client, record)?;
                println!(
                    "id={} category={} state={}",
                    record.id,
                    record.category,
                    st.as_str()
                );
                if st == ReconcileState::Drifted {
                    drifted += 1;
                }
                refreshed.push(record);
            }
            file.records = refreshed;
            file.save(&state)?;
            Ok(drift_exit(drifted))
        }

        Commands::Release { state } => {
            let file = StateFile::load(&state)?;
            for record in &file.records {
                lifecycle::delete(record);
                println!("released=true id={} category={}", record.id, record.category);
            }
            if state.exists() {
                fs::remove_file(&state)
                    .with_context(|| format!("remove state file failed: {}", state.display()))?;
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn connect(config_json: &Value) -> Result<RouterOsClient> {
    let settings = rfl_config::resolve_connection(config_json)?;
    let client =
        RouterOsClient::new(settings.client_opts()).context("appliance client setup failed")?;
    info!(base_url = client.base_url(), "appliance client ready");
    Ok(client)
}

fn apply_untracked(
    client: &RouterOsClient,
    specs: &[OrderingSpec],
    force: bool,
) -> Result<ExitCode> {
    for spec in specs {
        let action = if force {
            let rules = spec.resolve_all(client)?;
            spec.enforce(client, &rules)?;
            "reordered"
        } else if rfl_ordering::reconcile(client, spec)?.was_reordered() {
            "reordered"
        } else {
            "unchanged"
        };
        println!(
            "category={} rules={} action={}",
            spec.category,
            spec.desired_order.join(","),
            action
        );
    }
    Ok(ExitCode::SUCCESS)
}

/// Plan each ordering against the prior record that tracks it: create when
/// there is none, update when the desired order changed or drifted, keep
/// otherwise. Prior records no ordering claims are released.
///
/// When an ordering fails, records already planned and every prior record
/// not yet visited are saved before the error is returned.
fn apply_tracked(
    client: &RouterOsClient,
    specs: &[OrderingSpec],
    force: bool,
    path: PathBuf,
) -> Result<ExitCode> {
    let mut prior = StateFile::load(&path)?;
    let mut next = StateFile::default();

    for spec in specs {
        let claimed = prior.claim(spec);
        let (record, st, action) = match plan(client, spec, force, claimed.as_ref()) {
            Ok(planned) => planned,
            Err(err) => {
                next.records.extend(claimed);
                next.records.append(&mut prior.records);
                if let Err(save_err) = next.save(&path) {
                    warn!(path = %path.display(), "could not save partial state: {save_err:#}");
                }
                return Err(err.into());
            }
        };
        println!(
            "id={} category={} rules={} action={} state={}",
            record.id,
            record.category,
            spec.desired_order.join(","),
            action,
            st.as_str()
        );
        next.records.push(record);
    }

    for stale in &prior.records {
        lifecycle::delete(stale);
    }

    next.save(&path)?;
    Ok(ExitCode::SUCCESS)
}

fn plan(
    client: &RouterOsClient,
    spec: &OrderingSpec,
    force: bool,
    prior: Option<&OrderingRecord>,
) -> rfl_ordering::Result<(OrderingRecord, ReconcileState, &'static str)> {
    let Some(record) = prior else {
        let (record, st) = lifecycle::create(client, spec)?;
        return Ok((record, st, "created"));
    };
    if record.matches(spec) && !force {
        let (refreshed, st) = lifecycle::read(client, record)?;
        if !st.requires_enforce() {
            return Ok((refreshed, st, "unchanged"));
        }
        let (record, st) = lifecycle::update(client, spec, &refreshed)?;
        return Ok((record, st, "updated"));
    }
    let (record, st) = lifecycle::update(client, spec, record)?;
    Ok((record, st, "updated"))
}

fn drift_exit(drifted: usize) -> ExitCode {
    if drifted == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_DRIFT)
    }
}
