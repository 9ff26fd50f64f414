//! cyclekeeper - Main CLI Entry Point

use anyhow::{Context, Result};
use chrono::{Local, Timelike};
use clap::Parser;
use colored::Colorize;
use cyclekeeper::{
    cli::{Args, Commands, Verbosity},
    config::Config,
    context::ControllerContext,
    doctor,
    errors::ControllerError,
    health::HealthMonitor,
    logging,
    operations::{CommandOperation, HookTarget},
    recovery::{FailureClassifier, RecoveryCoordinator},
    scheduler::{CycleScheduler, StopReason},
    shutdown,
    simulate::{simulate, SimulationParams},
    timing::TimingController,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if let Err(message) = args.validate() {
        eprintln!("{} {}", "error:".red().bold(), message);
        std::process::exit(2);
    }

    logging::init(args.verbosity(), args.json_logs);
    let config = Config::load(args.config.clone()).context("Failed to load configuration")?;

    match &args.command {
        Commands::Run {
            command,
            cycles,
            no_health_monitor,
            seed,
        } => {
            run_operation(&args, config, command, *cycles, *no_health_monitor, *seed).await?;
        }
        Commands::Doctor { quick, json } => {
            run_doctor(config, *quick, *json).await?;
        }
        Commands::Simulate {
            cycles,
            failure_rate,
            start_hour,
            seed,
        } => {
            run_simulation(&config, *cycles, *failure_rate, *start_hour, *seed).await?;
        }
        Commands::Config { init } => {
            show_config(&args, &config, *init)?;
        }
    }

    Ok(())
}

async fn run_operation(
    args: &Args,
    mut config: Config,
    command: &str,
    cycles: Option<u64>,
    no_health_monitor: bool,
    seed: Option<u64>,
) -> Result<()> {
    if cycles.is_some() {
        config.scheduler.max_cycles = cycles;
    }
    if seed.is_some() {
        config.timing.seed = seed;
    }
    config.validate()?;

    let (trigger, shutdown_rx) = shutdown::channel();
    let ctx = ControllerContext::with_shutdown(shutdown_rx);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}", "Shutdown requested, stopping...".yellow());
            trigger.trigger();
        }
    });

    let timing = TimingController::new(config.timing.clone(), &ctx);
    let coordinator = Arc::new(RecoveryCoordinator::new(
        config.recovery.clone(),
        FailureClassifier::with_rules(config.classifier.rules.clone()),
        Arc::new(HookTarget::new(config.hooks.clone())),
        &ctx,
    ));
    let operation = CommandOperation::new(
        command,
        Duration::from_secs(config.scheduler.operation_timeout_secs),
    );

    let mut scheduler = CycleScheduler::new(
        operation,
        timing,
        coordinator,
        config.scheduler.clone(),
        Duration::from_secs(config.recovery.failure_window_secs),
        &ctx,
    );

    let monitor_task = if config.scheduler.run_health_monitor && !no_health_monitor {
        let monitor = Arc::new(HealthMonitor::new(config.health.clone(), &ctx));
        let (feed, handle) = monitor.spawn_periodic(
            Duration::from_secs(config.health.check_interval_secs),
            ctx.shutdown.clone(),
        );
        scheduler = scheduler.with_health_feed(feed);
        Some(handle)
    } else {
        None
    };

    if args.verbosity() != Verbosity::Quiet {
        println!("{} {}", "Pacing:".bold(), command.cyan());
    }

    let result = scheduler.run().await;
    if let Some(handle) = monitor_task {
        handle.abort();
    }

    match result {
        Ok(summary) => {
            if args.verbosity().show_events() {
                let stats = ctx.telemetry.get_stats();
                println!("\n{}", "Run Summary".bold());
                println!("─────────────────────────────────────");
                println!("Cycles:            {}", summary.cycles);
                println!("Success rate:      {:.1}%", summary.success_rate() * 100.0);
                println!("Recoveries:        {}", summary.recoveries);
                println!("Mean wait:         {:.1}s", stats.mean_wait_secs());
                println!("Pattern avoidance: {}", stats.pattern_interventions);
                println!(
                    "Stopped by:        {}",
                    match summary.stop_reason {
                        StopReason::MaxCycles => "cycle limit",
                        StopReason::Shutdown => "shutdown",
                    }
                );
                println!();
            }
            Ok(())
        }
        Err(e @ ControllerError::RecoveryExhausted { .. }) => {
            eprintln!("{} {}", "fatal:".red().bold(), e);
            eprintln!("Operator intervention required.");
            std::process::exit(3);
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_doctor(config: Config, quick: bool, json: bool) -> Result<()> {
    config.health.validate()?;
    let monitor = HealthMonitor::new(config.health, &ControllerContext::default());

    let healthy = if quick {
        let result = monitor.quick_health_check().await;
        if json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            doctor::display_quick(&result);
        }
        result.healthy
    } else {
        let report = monitor.perform_health_check().await;
        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            doctor::display_report(&report);
        }
        report.is_healthy()
    };

    std::process::exit(if healthy { 0 } else { 1 });
}

async fn run_simulation(
    config: &Config,
    cycles: u32,
    failure_rate: f64,
    start_hour: Option<u32>,
    seed: Option<u64>,
) -> Result<()> {
    config.validate()?;

    let now = Local::now().naive_local();
    let start = match start_hour {
        Some(hour) => now
            .date()
            .and_hms_opt(hour, 0, 0)
            .context("Invalid start hour")?,
        None => now.with_second(0).unwrap_or(now),
    };

    let params = SimulationParams {
        cycles,
        failure_rate,
        start,
        seed,
    };
    let results = simulate(config, &params).await?;

    println!(
        "\n{:>5}  {:<8}  {:<7}  {:>8}  {:<6}  {:<16}  {}",
        "cycle", "start", "result", "wait", "phase", "pattern", "recovery"
    );
    println!("{}", "─".repeat(72));
    for cycle in &results {
        let result = if cycle.success {
            "ok".green()
        } else {
            "fail".red()
        };
        println!(
            "{:>5}  {:<8}  {:<7}  {:>7.1}s  {:<6}  {:<16}  {}",
            cycle.cycle,
            cycle.started_at.format("%H:%M:%S"),
            result,
            cycle.wait_secs,
            format!("{:?}", cycle.phase).to_lowercase(),
            cycle.pattern.map(|p| p.to_string()).unwrap_or_default(),
            cycle.strategy.as_deref().unwrap_or("")
        );
    }

    let total: f64 = results.iter().map(|c| c.wait_secs).sum();
    if !results.is_empty() {
        println!(
            "\nMean wait {:.1}s over {} cycles",
            total / results.len() as f64,
            results.len()
        );
    }
    println!();

    Ok(())
}

fn show_config(args: &Args, config: &Config, init: bool) -> Result<()> {
    let path = args.config.clone().or_else(Config::default_path);

    if init {
        let path = path.context("Could not determine a configuration path")?;
        config.save(&path)?;
        println!("{} {}", "Wrote".green(), path.display());
        return Ok(());
    }

    println!("{}", "cyclekeeper configuration".bold());
    if let Some(path) = &path {
        let source = if path.exists() { "" } else { " (not found, using defaults)" };
        println!("# {}{}", path.display(), source);
    }
    println!();
    println!("{}", config.to_toml()?);

    Ok(())
}
