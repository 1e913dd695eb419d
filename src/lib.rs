//! dupekeep - keep one, resolve the rest
//!
//! Lifecycle management for groups of duplicate media files produced by a
//! similarity scan: review, rename and swap members, exclude groups from
//! future scans, remove redundant copies in filtered batches, and persist
//! the list between sessions.

pub mod actions;
pub mod cli;
pub mod config;
pub mod database;
pub mod duplicates;
pub mod error;
pub mod exclusion;
pub mod logging;
pub mod paths;
pub mod progress;
pub mod session;
pub mod signal;
pub mod workspace;

use std::io::IsTerminal;
use std::path::Path;

use anyhow::{bail, Context, Result};
use bytesize::ByteSize;
use yansi::Paint;

use crate::actions::rename::{ConflictDecision, NewName};
use crate::actions::resolve::{ResolveFilter, ResolveMode, ResolveRequest, SimilarityRange};
use crate::cli::{
    Cli, Commands, ExcludeArgs, ImportArgs, IngestArgs, RenameArgs, ResolveArgs, SummaryArgs,
    SwapArgs,
};
use crate::config::Config;
use crate::database::SqliteDatabase;
use crate::duplicates::{LogListener, ResultSummary};
use crate::error::ExitCode;
use crate::progress::BatchProgress;
use crate::workspace::{SaveDecision, ShutdownOutcome, Workspace};

type CliWorkspace = Workspace<SqliteDatabase>;

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns any error that aborts the command as a whole. Per-item failures
/// of a batch are reported and turn into [`ExitCode::PartialSuccess`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    let mut config = match &cli.config {
        Some(path) => Config::try_load_from(path)
            .with_context(|| format!("Invalid configuration file {}", path.display()))?,
        None => Config::load(),
    };
    if let Some(dir) = &cli.storage_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create storage directory {}", dir.display()))?;
        config.storage_dir = Some(dir.clone());
    }
    if cli.no_backup {
        config.backup_after_change = false;
    }

    let db_path = config.database_path();
    let db = SqliteDatabase::open(&db_path)
        .with_context(|| format!("Cannot open scan database {}", db_path.display()))?;
    let mut ws = Workspace::open(config, db);
    ws.subscribe(Box::new(LogListener));

    let quiet = cli.quiet;
    let (code, mutated) = match cli.command {
        Commands::Ingest(args) => (ingest(&mut ws, &args)?, true),
        Commands::Summary(args) => (summary(&ws, &args)?, false),
        Commands::Exclude(args) => (exclude(&mut ws, &args)?, true),
        Commands::Rename(args) => (rename(&mut ws, &args)?, true),
        Commands::Swap(args) => (swap(&mut ws, &args)?, true),
        Commands::Resolve(args) => (resolve(&mut ws, &args, quiet)?, true),
        Commands::Export(args) => {
            ws.export_json(&args.file, args.pretty)
                .with_context(|| format!("Export to {} failed", args.file.display()))?;
            println!(
                "Exported {} item(s) to {}",
                ws.results().len(),
                args.file.display()
            );
            (ExitCode::Success, false)
        }
        Commands::Import(args) => (import(&mut ws, &args)?, true),
    };

    if mutated && !ws.config().backup_after_change {
        finish_session(&mut ws)?;
    }
    Ok(code)
}

fn ingest(ws: &mut CliWorkspace, args: &IngestArgs) -> Result<ExitCode> {
    let scanned = session::read_json(&args.scan_json)
        .with_context(|| format!("Cannot read scan result {}", args.scan_json.display()))?;
    if !ws.results().is_empty() && !args.yes && !confirm_discard(ws.results().len())? {
        println!("Nothing changed.");
        return Ok(ExitCode::Success);
    }

    let hidden = ws.on_scan_complete(scanned);
    if !hidden.is_empty() {
        println!(
            "{} item(s) hidden by {} exclusion(s)",
            hidden.len(),
            ws.ledger().len()
        );
    }
    print_summary(&ws.summary());
    Ok(ExitCode::Success)
}

fn summary(ws: &CliWorkspace, args: &SummaryArgs) -> Result<ExitCode> {
    let summary = ws.summary();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(ExitCode::Success);
    }

    print_summary(&summary);
    if args.groups {
        let results = ws.results();
        for group in results.group_ids() {
            let members = results.group_members(group);
            println!();
            println!(
                "{} {} ({} files)",
                "Group".bold(),
                group.cyan(),
                members.len()
            );
            for item in members {
                let mark = if item.checked { "[x]" } else { "[ ]" };
                println!(
                    "  {} {} {} {:.1}% {}",
                    mark,
                    ByteSize::b(item.size),
                    item.media_kind,
                    item.similarity,
                    item.path.display()
                );
            }
        }
    }
    Ok(ExitCode::Success)
}

fn exclude(ws: &mut CliWorkspace, args: &ExcludeArgs) -> Result<ExitCode> {
    let removed = ws
        .exclude_group(args.group)
        .with_context(|| format!("Cannot exclude group {}", args.group))?;
    println!(
        "Excluded group {}: {} item(s) removed from the list",
        args.group,
        removed.len()
    );
    Ok(ExitCode::Success)
}

fn rename(ws: &mut CliWorkspace, args: &RenameArgs) -> Result<ExitCode> {
    let new_name = if args.with_extension {
        NewName::file_name(args.new_name.clone())
    } else {
        NewName::stem(args.new_name.clone())
    };

    let overwrite = args.overwrite;
    let interactive = std::io::stdin().is_terminal();
    let mut resolver = |target: &Path| {
        if overwrite {
            ConflictDecision::Overwrite
        } else if interactive {
            ask_conflict(target)
        } else {
            ConflictDecision::Cancel
        }
    };

    let outcome = ws.rename(&args.path, new_name, &mut resolver)?;
    println!(
        "{} {} -> {}",
        "Renamed".green(),
        outcome.change.from.display(),
        outcome.change.to.display()
    );
    if let Some(displaced) = &outcome.displaced {
        println!("Overwritten list item removed: {}", displaced.path.display());
    }
    Ok(warnings_code(outcome.sync_warnings.len()))
}

fn ask_conflict(target: &Path) -> ConflictDecision {
    let choices = ["Overwrite", "Choose another name", "Cancel"];
    let picked = dialoguer::Select::new()
        .with_prompt(format!("{} already exists", target.display()))
        .items(&choices)
        .default(2)
        .interact();
    match picked {
        Ok(0) => ConflictDecision::Overwrite,
        Ok(1) => match dialoguer::Input::<String>::new()
            .with_prompt("New name")
            .interact_text()
        {
            Ok(name) => ConflictDecision::Retry(name),
            Err(_) => ConflictDecision::Cancel,
        },
        _ => ConflictDecision::Cancel,
    }
}

fn swap(ws: &mut CliWorkspace, args: &SwapArgs) -> Result<ExitCode> {
    let outcome = match &args.second {
        Some(second) => {
            ws.set_swap_first(&args.first)?;
            ws.set_swap_second(second)?;
            ws.swap_selected()?
        }
        None => ws.swap_in_group(&args.first)?,
    };
    println!(
        "{} {} <-> {}",
        "Swapped".green(),
        outcome.first.to.display(),
        outcome.second.to.display()
    );
    Ok(warnings_code(outcome.sync_warnings.len()))
}

fn resolve(ws: &mut CliWorkspace, args: &ResolveArgs, quiet: bool) -> Result<ExitCode> {
    let similarity = SimilarityRange::new(args.similarity_from, args.similarity_to)?;
    let mode = ResolveMode::from(args.mode);
    let request = ResolveRequest::new(mode)
        .with_filter(ResolveFilter {
            path_contains: args.path_contains.clone(),
            media_kind: args.media.map(Into::into),
            similarity,
        })
        .with_exclude(args.exclude);

    if args.select_duplicates {
        ws.check_all_but_first();
    }
    for path in &args.select {
        if !ws.set_checked(path, true) {
            bail!("{} is not in the list", path.display());
        }
    }

    let checked = ws.summary().checked_count;
    if checked == 0 {
        println!("No checked items. Use --select or --select-duplicates.");
        return Ok(ExitCode::Success);
    }
    if (mode.touches_disk() || args.exclude) && !args.yes {
        let prompt = format!("Resolve up to {} checked item(s) ({})?", checked, mode);
        let proceed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        if !proceed {
            println!("Nothing changed.");
            return Ok(ExitCode::Success);
        }
    }

    let handler = signal::install_handler()?;
    let progress = BatchProgress::new(quiet);
    let outcome = ws.resolve(&request, Some(&progress), Some(handler.flag()));

    for failure in &outcome.failures {
        eprintln!("{} {}: {}", "Failed".red(), failure.path.display(), failure.error);
    }
    for warning in &outcome.sync_warnings {
        eprintln!("{} {}", "Warning".yellow(), warning);
    }
    println!("{}", outcome.summary());

    if outcome.cancelled {
        Ok(ExitCode::Interrupted)
    } else if outcome.is_partial() {
        Ok(ExitCode::PartialSuccess)
    } else {
        Ok(ExitCode::Success)
    }
}

fn import(ws: &mut CliWorkspace, args: &ImportArgs) -> Result<ExitCode> {
    let yes = args.yes;
    let mut prompt_error = None;
    let imported = ws
        .import_json(&args.file, |count| {
            yes || confirm_discard(count).unwrap_or_else(|e| {
                prompt_error = Some(e);
                false
            })
        })
        .with_context(|| format!("Import from {} failed", args.file.display()))?;
    if let Some(e) = prompt_error {
        return Err(e);
    }
    if imported {
        print_summary(&ws.summary());
    } else {
        println!("Nothing changed.");
    }
    Ok(ExitCode::Success)
}

fn finish_session(ws: &mut CliWorkspace) -> Result<()> {
    let interactive = std::io::stdin().is_terminal();
    let outcome = ws.shutdown(|| {
        if !interactive {
            return SaveDecision::No;
        }
        match dialoguer::Confirm::new()
            .with_prompt("Save the results for the next session?")
            .default(true)
            .interact_opt()
        {
            Ok(Some(true)) => SaveDecision::Yes,
            Ok(Some(false)) => SaveDecision::No,
            _ => SaveDecision::Cancel,
        }
    })?;
    if outcome == ShutdownOutcome::Saved {
        log::info!("Results saved");
    }
    Ok(())
}

fn confirm_discard(count: usize) -> Result<bool> {
    Ok(dialoguer::Confirm::new()
        .with_prompt(format!("Discard the {} item(s) currently in the list?", count))
        .default(false)
        .interact()?)
}

fn warnings_code(warnings: usize) -> ExitCode {
    if warnings == 0 {
        ExitCode::Success
    } else {
        ExitCode::PartialSuccess
    }
}

fn print_summary(summary: &ResultSummary) {
    println!(
        "{} item(s) in {} group(s), {} total, {} reclaimable, {} checked",
        summary.item_count.bold(),
        summary.group_count.bold(),
        ByteSize::b(summary.total_size),
        ByteSize::b(summary.reclaimable_size).green(),
        summary.checked_count
    );
}
