mod commands;
mod format;
mod logging;
mod progress;

use std::fs;
use std::io::{self, Write};
use std::process;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use dupe_lint_core::storage::{Database, SqliteRewriter};
use dupe_lint_core::{AppConfig, Catalog, DedupeEngine, ReferenceRewriter};
use format::nice_bytes;
use progress::CliReporter;
use tracing::{error, info};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match dupe_lint_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();
    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return;
    };

    if let Err(err) = run(command, &config) {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn run(command: Commands, config: &AppConfig) -> Result<()> {
    if let Commands::PrintConfig = command {
        println!("Configuration: {:#?}", config);
        return Ok(());
    }

    let db = Database::open(&config.db_path)
        .with_context(|| format!("opening catalog '{}'", config.db_path))?;
    let rewriter = SqliteRewriter::new(&db);
    let mut engine = DedupeEngine::new(config, &db, &rewriter);

    match command {
        Commands::List { linted } => run_list(&mut engine, linted),
        Commands::DuplicatePosts => run_duplicate_posts(&mut engine),
        Commands::Orphans { all } => {
            run_orphans(&mut engine, all || config.include_all_subdirectories)
        }
        Commands::Deduplicate { dry_run, yes } => run_deduplicate(&mut engine, dry_run, yes),
        Commands::RegenerateMetadata => {
            let rows = engine.rebuild_metadata()?;
            println!("{} merged records recorded", rows.to_string().green());
            Ok(())
        }
        Commands::ShowRecord { id } => run_show_record(&db, id),
        Commands::PrintConfig => Ok(()),
    }
}

fn run_list<C, R>(engine: &mut DedupeEngine<'_, C, R>, linted: bool) -> Result<()>
where
    C: Catalog,
    R: ReferenceRewriter,
{
    let reporter = CliReporter::new();
    let groups = engine.duplicate_files(&reporter)?;

    let mut wasted: u64 = 0;
    for group in &groups {
        let size = fs::metadata(engine.root().join(&group.paths[0]))
            .map(|m| m.len())
            .unwrap_or(0);
        wasted += size * group.redundant_count() as u64;

        println!("{} ({})", group.digest.to_string().cyan(), nice_bytes(size));
        for path in &group.paths {
            println!("    {}", path);
        }
    }
    info!(
        "{} duplicate groups, {} reclaimable",
        groups.len().to_string().red(),
        nice_bytes(wasted).red(),
    );

    if linted {
        let linted = engine.linted_groups(false)?;
        println!();
        for (path, ids) in &linted {
            println!("{} {:?}", path.yellow(), ids);
        }
        info!("{} linted paths", linted.len().to_string().cyan());
    }
    Ok(())
}

fn run_duplicate_posts<C, R>(engine: &mut DedupeEngine<'_, C, R>) -> Result<()>
where
    C: Catalog,
    R: ReferenceRewriter,
{
    let groups = engine.duplicate_posts(true)?;
    for (path, ids) in &groups {
        println!("{} {:?}", path.yellow(), ids);
    }
    info!(
        "{} paths shared by {} records",
        groups.len().to_string().cyan(),
        groups.values().map(Vec::len).sum::<usize>().to_string().cyan(),
    );
    Ok(())
}

fn run_orphans<C, R>(engine: &mut DedupeEngine<'_, C, R>, include_all_subdirectories: bool) -> Result<()>
where
    C: Catalog,
    R: ReferenceRewriter,
{
    let orphans = engine.orphans(include_all_subdirectories)?;
    let mut total: u64 = 0;
    for orphan in &orphans {
        let size = fs::metadata(engine.root().join(orphan))
            .map(|m| m.len())
            .unwrap_or(0);
        total += size;
        println!("{} ({})", orphan, nice_bytes(size));
    }
    info!(
        "{} orphaned files, {}",
        orphans.len().to_string().red(),
        nice_bytes(total).red(),
    );
    Ok(())
}

fn run_deduplicate<C, R>(engine: &mut DedupeEngine<'_, C, R>, dry_run: bool, yes: bool) -> Result<()>
where
    C: Catalog,
    R: ReferenceRewriter,
{
    let reporter = CliReporter::new();
    let plans = engine.preview(&reporter)?;
    if plans.is_empty() {
        println!("Nothing to deduplicate");
        return Ok(());
    }

    for plan in &plans {
        println!("{} {}", "keep".green(), plan.primary);
        for stale in &plan.stale_files {
            println!("  {} {}", "drop".red(), stale);
        }
        println!("  records {:?}", plan.affected_record_ids);
    }
    println!(
        "{} groups, {} files to remove",
        plans.len(),
        plans.iter().map(|p| p.stale_files.len()).sum::<usize>()
    );

    if dry_run {
        return Ok(());
    }
    if !yes && !prompt_confirm("Consolidate these files? This cannot be undone.", Some(false))? {
        return Ok(());
    }

    let result = engine.consolidate(&reporter)?;
    let rows = engine.rebuild_metadata()?;

    println!();
    info!(
        "Merged {} groups ({} failed, {} skipped) in {}",
        result.groups_processed.to_string().green(),
        result.groups_failed.to_string().red(),
        result.groups_skipped,
        format!("{:.2}s", result.duration.as_secs_f64()).green(),
    );
    info!(
        "{} records repointed, {} files deleted, {} saved, {} merge rows",
        result.affected_record_ids.len().to_string().cyan(),
        result.files_deleted.len().to_string().cyan(),
        nice_bytes(result.bytes_saved).green(),
        rows,
    );
    Ok(())
}

fn run_show_record(db: &Database, id: i64) -> Result<()> {
    let Some(record) = db.get_record(id)? else {
        println!("Record {} not found", id);
        return Ok(());
    };

    println!("{} {}", id.to_string().cyan(), record.path);
    match db.merge_primary_of(id)? {
        Some(primary) if primary == id => {
            println!("  primary of a merged group");
        }
        Some(primary) => println!("  merged into record {}", primary.to_string().green()),
        None => println!("  not deduplicated"),
    }
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
