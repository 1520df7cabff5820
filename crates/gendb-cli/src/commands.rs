use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use gendb_db::{Database, DbConfig, Progress};
use gendb_store::{codec, BackendConfig, BackendKind, LogFileBackend};
use gendb_types::{Handle, ObjectType};
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let json = matches!(cli.format, OutputFormat::Json);
    match cli.command {
        Command::Init => cmd_init(&config),
        Command::Stats => cmd_stats(&config, json),
        Command::Check(args) => cmd_check(&config, args, json),
        Command::Reindex => cmd_reindex(&config),
        Command::Rebuild => cmd_rebuild(&config),
        Command::Copy(args) => cmd_copy(&config, args),
        Command::Export(args) => cmd_export(&config, args),
        Command::Get(args) => cmd_get(&config, args),
        Command::Backlinks(args) => cmd_backlinks(&config, args, json),
        Command::Prefix(args) => cmd_prefix(&config, args),
        Command::Surnames => cmd_surnames(&config, json),
        Command::Compact => cmd_compact(&config),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<DbConfig> {
    let mut config = match &cli.config {
        Some(path) => DbConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => DbConfig::default(),
    };
    if let Some(kind) = cli.backend {
        config.backend.kind = kind.into();
    }
    if let Some(path) = &cli.path {
        config.backend.path = Some(path.clone());
    }
    Ok(config)
}

fn open(config: &DbConfig, read_only: bool) -> anyhow::Result<Database> {
    let mut config = config.clone();
    if read_only && config.backend.kind != BackendKind::Memory {
        config.backend.read_only = true;
    }
    let location = describe(&config.backend);
    Database::open(config).with_context(|| format!("failed to open {location}"))
}

fn describe(backend: &BackendConfig) -> String {
    match &backend.path {
        Some(path) => format!("{} database {}", backend.kind, path.display()),
        None => format!("{} database", backend.kind),
    }
}

/// Progress that prints a line every `every` steps.
fn printing_progress(every: usize) -> impl Progress {
    move |phase: &str, done: usize, total: usize| {
        if done % every == 0 || done == total {
            eprintln!("  {phase}: {done}/{total}");
        }
        true
    }
}

fn cmd_init(config: &DbConfig) -> anyhow::Result<()> {
    let db = open(config, false)?;
    println!(
        "{} Opened {}",
        "✓".green().bold(),
        describe(&config.backend).bold()
    );
    println!("  Database id: {}", db.dbid().cyan());
    db.close()?;
    Ok(())
}

fn cmd_stats(config: &DbConfig, json: bool) -> anyhow::Result<()> {
    let db = open(config, true)?;
    let summary = db.summary()?;
    if json {
        let counts: serde_json::Map<_, _> = summary
            .counts
            .iter()
            .map(|(ty, n)| (ty.class_name().to_string(), json!(n)))
            .collect();
        let out = json!({
            "dbid": summary.dbid,
            "backend": summary.backend,
            "schema_version": summary.schema_version,
            "read_only": summary.read_only,
            "counts": counts,
            "surnames": db.surname_list().len(),
        });
        println!("{out}");
        return Ok(());
    }
    println!("Database {}", summary.dbid.cyan());
    println!(
        "  Backend: {}  Schema: {}",
        summary.backend.to_string().yellow(),
        summary.schema_version
    );
    for (ty, n) in &summary.counts {
        println!("  {:<12} {:>8}", ty.class_name(), n.to_string().bold());
    }
    println!("  {:<12} {:>8}", "Surnames", db.surname_list().len());
    Ok(())
}

fn cmd_check(config: &DbConfig, args: CheckArgs, json: bool) -> anyhow::Result<()> {
    let db = open(config, true)?;
    let report = db.check_integrity()?;
    if json {
        let out = json!({
            "clean": report.is_clean(),
            "dangling": &report.dangling,
            "missing": &report.missing,
            "stale": &report.stale,
            "undecodable": &report.undecodable,
        });
        println!("{out}");
    } else {
        println!("  Missing edges: {}", report.missing.len());
        println!("  Stale edges: {}", report.stale.len());
        println!("  Undecodable rows: {}", report.undecodable.len());
        println!("  Dangling references: {}", report.dangling.len());
        if args.details {
            for e in &report.missing {
                println!("    {} {} {} -> {} {}", "missing".red(), e.referrer_type, e.referrer, e.referenced_type, e.referenced);
            }
            for e in &report.stale {
                println!("    {} {} {} -> {} {}", "stale".red(), e.referrer_type, e.referrer, e.referenced_type, e.referenced);
            }
            for r in &report.undecodable {
                println!("    {} {} {}", "undecodable".red(), r.object_type, r.handle);
            }
            for e in &report.dangling {
                println!("    {} {} {} -> {} {}", "dangling".yellow(), e.referrer_type, e.referrer, e.referenced_type, e.referenced);
            }
        }
    }
    if !report.is_clean() {
        bail!("integrity problems found; run `gendb reindex`");
    }
    if !json {
        println!("{} Reference index consistent", "✓".green().bold());
    }
    Ok(())
}

fn cmd_reindex(config: &DbConfig) -> anyhow::Result<()> {
    let mut db = open(config, false)?;
    db.reindex_reference_map(&mut printing_progress(1000))?;
    db.close()?;
    println!("{} Reference index rebuilt", "✓".green().bold());
    Ok(())
}

fn cmd_rebuild(config: &DbConfig) -> anyhow::Result<()> {
    let mut db = open(config, false)?;
    db.rebuild_secondary(&mut printing_progress(1000))?;
    let surnames = db.surname_list().len();
    db.close()?;
    println!(
        "{} Secondary data rebuilt ({} surnames)",
        "✓".green().bold(),
        surnames
    );
    Ok(())
}

fn cmd_copy(config: &DbConfig, args: CopyArgs) -> anyhow::Result<()> {
    let target_config = match args.to_backend {
        BackendArg::Sqlite => DbConfig::sqlite(&args.to_path),
        BackendArg::Logfile => DbConfig::logfile(&args.to_path),
        BackendArg::Memory => bail!("copying into a memory database would discard the copy"),
    };
    let source = open(config, true)?;
    let mut target = open(&target_config, false)?;
    target.copy_from(&source, &mut printing_progress(1000))?;
    let objects: usize = target.summary()?.counts.iter().map(|(_, n)| n).sum();
    target.close()?;
    println!(
        "{} Copied {} objects to {}",
        "✓".green().bold(),
        objects,
        args.to_path.display().to_string().bold()
    );
    Ok(())
}

fn cmd_export(config: &DbConfig, args: ExportArgs) -> anyhow::Result<()> {
    let db = open(config, true)?;
    let types = if args.types.is_empty() {
        ObjectType::ALL.to_vec()
    } else {
        args.types
    };
    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let mut written = 0usize;
    for ty in types {
        for row in db.raw_cursor(ty) {
            let row = row?;
            match codec::from_row(&row) {
                Ok(object) => {
                    serde_json::to_writer(&mut out, &object)?;
                    out.write_all(b"\n")?;
                    written += 1;
                }
                Err(e) => tracing::warn!(object_type = %ty, handle = %row.handle, error = %e, "not exported"),
            }
        }
    }
    out.flush()?;
    if let Some(path) = &args.output {
        eprintln!("{} Exported {} objects to {}", "✓".green().bold(), written, path.display());
    }
    Ok(())
}

fn cmd_get(config: &DbConfig, args: GetArgs) -> anyhow::Result<()> {
    let db = open(config, true)?;
    let handle = Handle::from(args.key.as_str());
    let object = match db.get_object(args.object_type, &handle)? {
        Some(object) => object,
        None => match db.backend().handle_for_id(args.object_type, &args.key)? {
            Some(handle) => match db.get_object(args.object_type, &handle)? {
                Some(object) => object,
                None => bail!("{} {} not found", args.object_type, args.key),
            },
            None => bail!("{} {} not found", args.object_type, args.key),
        },
    };
    println!("{}", serde_json::to_string_pretty(&object)?);
    Ok(())
}

fn cmd_backlinks(config: &DbConfig, args: BacklinksArgs, json: bool) -> anyhow::Result<()> {
    let db = open(config, true)?;
    let handle = Handle::parse(&args.handle)?;
    let include = (!args.types.is_empty()).then_some(args.types.as_slice());
    let referrers: Vec<_> = db.find_backlink_handles(&handle, include)?.collect();
    if json {
        println!("{}", serde_json::to_string(&referrers)?);
        return Ok(());
    }
    if referrers.is_empty() {
        println!("Nothing references {}", handle.to_string().yellow());
    }
    for r in referrers {
        println!("  {:<12} {}", r.object_type.class_name(), r.handle);
    }
    Ok(())
}

fn cmd_prefix(config: &DbConfig, args: PrefixArgs) -> anyhow::Result<()> {
    match args.template {
        Some(template) => {
            let mut db = open(config, false)?;
            let stored = db.set_id_prefix(args.object_type, &template)?;
            db.close()?;
            if stored != template {
                println!("{} Template adjusted to {}", "!".yellow().bold(), stored.bold());
            } else {
                println!("{} {} ids now use {}", "✓".green().bold(), args.object_type, stored.bold());
            }
        }
        None => {
            let db = open(config, true)?;
            println!("{}", db.id_prefix(args.object_type));
        }
    }
    Ok(())
}

fn cmd_surnames(config: &DbConfig, json: bool) -> anyhow::Result<()> {
    let db = open(config, true)?;
    let surnames = db.surname_list();
    if json {
        println!("{}", serde_json::to_string(&surnames)?);
    } else {
        for s in surnames {
            let group = db.get_name_group_mapping(&s)?;
            if group == s {
                println!("{s}");
            } else {
                println!("{s} {}", format!("({group})").dimmed());
            }
        }
    }
    Ok(())
}

fn cmd_compact(config: &DbConfig) -> anyhow::Result<()> {
    if config.backend.kind != BackendKind::LogFile {
        bail!("only log-file databases can be compacted");
    }
    let Some(path) = config.backend.path.as_deref() else {
        bail!("no database path given");
    };
    compact(path, config)
}

fn compact(path: &Path, config: &DbConfig) -> anyhow::Result<()> {
    let backend = LogFileBackend::open(path, false, config.backend.sync_mode)?;
    let before = backend.offset()?;
    backend.compact()?;
    let after = backend.offset()?;
    println!(
        "{} Compacted {}: {} -> {} bytes",
        "✓".green().bold(),
        path.display(),
        before,
        after
    );
    Ok(())
}
