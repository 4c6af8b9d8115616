//! Foreman entry point.
//!
//! The binary parses arguments, builds one `ExecutionContext`, and invokes
//! exactly one engine operation per run (watch mode being the one loop).
//! Subcommands the engine does not know are resolved against the component
//! dispatch table and forwarded to the component's binary.

use chrono::Duration;
use clap::{Parser, Subcommand};
use colored::Colorize;
use foreman_cli::config::ForemanConfig;
use foreman_cli::error::CliError;
use foreman_cli::{render, DispatchTable};
use foreman_core::{
    generate_worker_id, ActionType, EngineError, ExecutionContext, OutputMode,
    DEFAULT_WORKER_PREFIX,
};
use foreman_engine::{
    detect_tmux_session, AssignOptions, Availability, LivenessChecker, Orchestrator,
    RegisterOptions, SystemRunner, UpdateOptions,
};
use serde_json::json;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Foreman - coordinate concurrent agents editing one workspace
#[derive(Parser)]
#[command(name = "foreman")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, env = "FOREMAN_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Orchestration root directory (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Output mode: human tables or machine-readable JSON
    #[arg(long, global = true, env = "FOREMAN_OUTPUT", default_value = "human")]
    output: OutputMode,

    /// Id of the agent driving this invocation
    #[arg(long, global = true, env = "FOREMAN_AGENT_ID")]
    agent: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current instances and the lock table
    Status,

    /// Register a new worker instance
    Register {
        #[arg(long)]
        instance: Option<String>,
        /// Multiplexer session backing the worker (auto-detected in tmux)
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        pid: Option<u32>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        task: Option<String>,
    },

    /// Assign work to a worker and claim its files
    Assign {
        #[arg(long)]
        instance: Option<String>,
        /// What the worker is doing
        #[arg(long)]
        task: String,
        /// Files to claim
        #[arg(long, num_args = 1.., value_name = "FILE")]
        files: Vec<String>,
        /// Proceed even when live conflicts were found
        #[arg(long)]
        force: bool,
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        pid: Option<u32>,
        #[arg(long)]
        host: Option<String>,
    },

    /// Release a worker and free every lock it holds
    Release {
        #[arg(long)]
        instance: String,
    },

    /// Detect claim conflicts; exits nonzero when any exist
    Conflicts {
        /// Settle each conflict in favor of the newer claimant
        #[arg(long)]
        resolve: bool,
    },

    /// Probe whether a file is free before touching it
    Check {
        file: String,
        #[arg(long)]
        instance: Option<String>,
        /// Declared intent: edit, read, or create
        #[arg(long, value_name = "TYPE", default_value = "edit")]
        action: ActionType,
    },

    /// Refresh a worker's heartbeat, task, or claimed files
    Update {
        #[arg(long)]
        instance: String,
        /// Refresh the heartbeat timestamp
        #[arg(long)]
        heartbeat: bool,
        #[arg(long)]
        task: Option<String>,
        /// Additional files to record (no locks are taken)
        #[arg(long, num_args = 1.., value_name = "FILE")]
        files: Vec<String>,
    },

    /// Orchestration dashboard
    Dashboard {
        /// Re-render on a fixed interval until interrupted
        #[arg(long)]
        watch: bool,
    },

    /// List installed components
    Components,

    #[command(external_subcommand)]
    External(Vec<String>),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let ctx = ExecutionContext {
        interactive: cli.agent.is_none() && std::io::stdout().is_terminal(),
        agent_id: cli.agent.clone(),
        output_mode: cli.output,
    };
    if !ctx.interactive {
        colored::control::set_override(false);
    }

    match run(cli, &ctx) {
        Ok(code) => code,
        Err(err) => {
            emit_error(&ctx, &err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, ctx: &ExecutionContext) -> Result<ExitCode, CliError> {
    let config = ForemanConfig::load(cli.config.as_deref())?;
    let root = cli.root.unwrap_or_else(|| config.orchestration_root.clone());

    // Ambient facts resolved once, here, then passed along explicitly.
    let local_host = std::env::var("HOSTNAME").ok();
    let in_tmux = std::env::var_os("TMUX").is_some();

    let mut liveness = LivenessChecker::new(Box::new(SystemRunner))
        .with_window(Duration::seconds(config.heartbeat_window_secs));
    if let Some(host) = &local_host {
        liveness = liveness.with_local_host(host);
    }
    let engine = Orchestrator::open(&root, liveness);

    match cli.command.unwrap_or(Commands::Dashboard { watch: false }) {
        Commands::Status => {
            let report = engine.status()?;
            emit(
                ctx,
                serde_json::to_value(&report).unwrap_or_default(),
                render::status(&report),
            );
            Ok(ExitCode::SUCCESS)
        }

        Commands::Register {
            instance,
            session,
            pid,
            host,
            task,
        } => {
            let session = session.or_else(|| detect_tmux_session(&SystemRunner, in_tmux));
            let registered = engine.register(RegisterOptions {
                instance: instance.or_else(|| ctx.agent_id.clone()),
                session,
                pid,
                host: host.or_else(|| local_host.clone()),
                task,
            })?;
            let human = format!(
                "{} Registered worker: {}\n",
                "✔".green(),
                registered.id
            );
            emit(ctx, json!({ "registered": registered }), human);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Assign {
            instance,
            task,
            files,
            force,
            session,
            pid,
            host,
        } => {
            let session = session.or_else(|| detect_tmux_session(&SystemRunner, in_tmux));
            let assigned = engine.assign(AssignOptions {
                instance: instance.or_else(|| ctx.agent_id.clone()),
                task,
                files,
                force,
                session,
                pid,
                host: host.or_else(|| local_host.clone()),
            })?;
            let mut human = format!(
                "{} Work assigned to instance: {}\n  Task: {}\n",
                "✔".green(),
                assigned.id,
                assigned.task
            );
            if !assigned.files.is_empty() {
                human.push_str(&format!("  Files locked: {}\n", assigned.files.join(", ")));
            }
            emit(ctx, json!({ "assigned": assigned }), human);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Release { instance } => {
            let released = engine.release(&instance)?;
            let human = if released.already_completed {
                format!("Instance already completed: {}\n", released.id)
            } else {
                format!("{} Released instance: {}\n", "✔".green(), released.id)
            };
            emit(ctx, json!({ "released": released }), human);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Conflicts { resolve } => {
            let records = engine.detect_conflicts()?;
            let settled = if resolve && !records.is_empty() {
                engine.resolve_conflicts(&records)?
            } else {
                Vec::new()
            };

            let mut human = render::conflicts(&records);
            if !settled.is_empty() {
                human.push_str(&render::resolutions(&settled));
            }
            emit(ctx, json!({ "conflicts": &records, "resolutions": &settled }), human);

            if records.is_empty() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }

        Commands::Check {
            file,
            instance,
            action,
        } => {
            let instance = instance.or_else(|| ctx.agent_id.clone()).unwrap_or_else(|| {
                let session = detect_tmux_session(&SystemRunner, in_tmux);
                generate_worker_id(DEFAULT_WORKER_PREFIX, session.as_deref(), std::process::id())
            });
            let availability = engine.check_availability(&file, &instance, action)?;

            let human = match &availability {
                Availability::Available { own_lock: true, .. } => {
                    format!("{} {} (already yours)\n", "✔".green(), file)
                }
                Availability::Available { .. } => format!("{} {}\n", "✔".green(), file),
                Availability::Unavailable {
                    locked_by,
                    locked_at,
                } => format!(
                    "{} CONFLICT: {} is being edited by {}\n  Locked {}\n",
                    "✘".red(),
                    file,
                    locked_by,
                    render::fmt_ago(*locked_at)
                ),
            };
            let mut payload = serde_json::to_value(&availability).unwrap_or_default();
            if let Some(map) = payload.as_object_mut() {
                map.insert("file".to_string(), json!(file));
                map.insert("instance".to_string(), json!(instance));
            }
            emit(ctx, payload, human);

            if availability.is_available() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }

        Commands::Update {
            instance,
            heartbeat,
            task,
            files,
        } => {
            let updated = engine.update(
                &instance,
                UpdateOptions {
                    heartbeat,
                    task,
                    files,
                },
            )?;
            emit(
                ctx,
                json!({ "updated": updated }),
                format!("{} Updated instance: {}\n", "✔".green(), updated.id),
            );
            Ok(ExitCode::SUCCESS)
        }

        Commands::Dashboard { watch } => {
            loop {
                let report = engine.dashboard()?;
                if ctx.is_json() {
                    emit(
                        ctx,
                        serde_json::to_value(&report).unwrap_or_default(),
                        String::new(),
                    );
                } else {
                    if watch {
                        // Clear and home before each re-render.
                        print!("\x1b[2J\x1b[1;1H");
                    }
                    print!("{}", render::dashboard(&report));
                }
                if !watch {
                    break;
                }
                std::thread::sleep(std::time::Duration::from_millis(config.refresh_interval_ms));
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Components => {
            let table = DispatchTable::scan(&config.components_root)?;
            let human = if table.is_empty() {
                "No components installed\n".to_string()
            } else {
                let rows: Vec<Vec<String>> = table
                    .iter()
                    .map(|d| {
                        vec![
                            d.name.clone(),
                            d.binary.display().to_string(),
                            d.description.clone().unwrap_or_default(),
                        ]
                    })
                    .collect();
                render::table(&["Component", "Binary", "Description"], &rows)
            };
            let names: Vec<&str> = table.iter().map(|d| d.name.as_str()).collect();
            emit(ctx, json!({ "components": names }), human);
            Ok(ExitCode::SUCCESS)
        }

        Commands::External(args) => {
            let table = DispatchTable::scan(&config.components_root)?;
            let (name, rest) = args.split_first().ok_or_else(|| CliError::UnknownComponent {
                name: String::new(),
            })?;
            let output = table.forward(&SystemRunner, name, rest)?;
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
            Ok(ExitCode::from(output.exit_code().clamp(0, 255) as u8))
        }
    }
}

fn emit(ctx: &ExecutionContext, payload: serde_json::Value, human: String) {
    if ctx.is_json() {
        println!("{}", payload);
    } else {
        print!("{}", human);
    }
}

fn emit_error(ctx: &ExecutionContext, err: &CliError) {
    if ctx.is_json() {
        let payload = match err {
            CliError::Engine(EngineError::Conflicts { conflicts }) => {
                json!({ "error": err.to_string(), "conflicts": conflicts })
            }
            _ => json!({ "error": err.to_string() }),
        };
        println!("{}", payload);
        return;
    }

    eprintln!("{} {}", "error:".red().bold(), err);
    if let CliError::Engine(EngineError::Conflicts { conflicts }) = err {
        for (file, owner) in conflicts {
            eprintln!("  • {} is locked by {}", file, owner);
        }
        eprintln!("  (re-run with --force to override)");
    }
}
