use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use shelf_engine::{
    EngineConfig, FieldValue, ObjectRecord, Oid, PersistenceEngine, Record, Reconciliation, Version,
};
use tracing::debug;

use crate::cli::*;

const DEFAULT_CONFIG: &str = "shelf.toml";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let engine = PersistenceEngine::open(&config)
        .with_context(|| format!("opening store at {}", config.root.display()))?;
    let format = cli.format;

    match cli.command {
        Command::Show(args) => cmd_show(&engine, args, format),
        Command::Instances(args) => cmd_instances(&engine, &config, args, format),
        Command::Count(args) => cmd_count(&engine, &config, args, format),
        Command::NextId(args) => cmd_next_id(&engine, args, format),
        Command::Remove(args) => cmd_remove(&engine, args, format),
        Command::Check => cmd_check(&engine, format),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).is_file() => EngineConfig::load(DEFAULT_CONFIG)?,
        None => EngineConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    debug!(root = %config.root.display(), types = config.types.len(), "configuration loaded");
    Ok(config)
}

fn parse_oid(text: &str) -> anyhow::Result<Oid> {
    text.parse::<Oid>()
        .with_context(|| format!("invalid identifier {text:?}"))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_show(
    engine: &PersistenceEngine,
    args: ShowArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let oid = parse_oid(&args.oid)?;
    let record = engine.load_data(&oid)?;
    if format == OutputFormat::Json {
        return print_json(&record);
    }

    let version = record.version();
    println!(
        "{} {} {}",
        record.oid().to_string().yellow().bold(),
        format!("#{}", version.sequence_hex()).cyan(),
        format!("({})", version.user).dimmed()
    );
    match &record {
        Record::Object(object) => {
            for (name, value) in object.fields.iter() {
                match value {
                    FieldValue::Scalar(text) => println!("  {} = {:?}", name.bold(), text),
                    FieldValue::Reference(target) => {
                        println!("  {} -> {}", name.bold(), target.to_string().yellow())
                    }
                    FieldValue::ReferenceList(targets) => {
                        let list: Vec<String> = targets.iter().map(Oid::to_string).collect();
                        println!("  {} -> [{}]", name.bold(), list.join(", ").yellow());
                    }
                }
            }
        }
        Record::Collection(collection) => {
            println!("  {} element(s)", collection.elements.len().to_string().bold());
            for element in &collection.elements {
                println!("  - {}", element.to_string().yellow());
            }
        }
    }
    Ok(())
}

/// Query-by-example pattern for a type key, with scalar field filters.
fn build_pattern(config: &EngineConfig, args: &QueryArgs) -> anyhow::Result<ObjectRecord> {
    let descriptor = config
        .types
        .iter()
        .find(|d| d.key == args.type_key)
        .with_context(|| format!("unknown type {}", args.type_key))?;
    let mut pattern = ObjectRecord::new(
        Oid::transient(descriptor.tag.as_str(), "pattern")?,
        Version::initial(config.user.as_str()),
    );
    for filter in &args.filters {
        let Some((field, value)) = filter.split_once('=') else {
            bail!("filter {filter:?} is not FIELD=VALUE");
        };
        pattern.fields.set(field, FieldValue::Scalar(value.to_string()));
    }
    Ok(pattern)
}

fn cmd_instances(
    engine: &PersistenceEngine,
    config: &EngineConfig,
    args: QueryArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let oids: Vec<Oid> = if args.filters.is_empty() {
        engine.instances_of(&args.type_key)?
    } else {
        let pattern = build_pattern(config, &args)?;
        engine
            .get_instances(&pattern)?
            .into_iter()
            .map(|record| record.oid)
            .collect()
    };

    if format == OutputFormat::Json {
        return print_json(&oids);
    }
    if oids.is_empty() {
        println!("No instances of {}.", args.type_key.bold());
    }
    for oid in &oids {
        println!("{}", oid.to_string().yellow());
    }
    Ok(())
}

fn cmd_count(
    engine: &PersistenceEngine,
    config: &EngineConfig,
    args: QueryArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let pattern = build_pattern(config, &args)?;
    let count = engine.number_of_instances(&pattern)?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "type": args.type_key,
            "count": count,
        })),
        OutputFormat::Text => {
            println!("{} {}", count.to_string().bold(), args.type_key);
            Ok(())
        }
    }
}

fn cmd_next_id(
    engine: &PersistenceEngine,
    args: NextIdArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let (id, oid) = match &args.tag {
        Some(tag) => {
            let oid = engine.create_oid(tag)?;
            let id = u64::from_str_radix(oid.local_id(), 16)?;
            (id, Some(oid))
        }
        None => (engine.next_id()?, None),
    };
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "id": id, "oid": oid })),
        OutputFormat::Text => {
            match oid {
                Some(oid) => println!("{}", oid.to_string().yellow()),
                None => println!("{id:X}"),
            }
            Ok(())
        }
    }
}

fn cmd_remove(
    engine: &PersistenceEngine,
    args: RemoveArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let oid = parse_oid(&args.oid)?;
    engine.remove(&oid)?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "removed": oid })),
        OutputFormat::Text => {
            println!("{} Removed {}", "✓".green().bold(), oid.to_string().yellow());
            Ok(())
        }
    }
}

fn cmd_check(engine: &PersistenceEngine, format: OutputFormat) -> anyhow::Result<()> {
    let report = engine.check()?;
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_report(&report),
    }
    if !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &Reconciliation) {
    println!(
        "Checked {} record(s) and {} index(es).",
        report.records_checked.to_string().bold(),
        report.indexes_checked.to_string().bold()
    );
    if report.is_clean() {
        println!("{} No issues.", "✓".green().bold());
        return;
    }
    for oid in &report.orphaned {
        println!("  {} {} is not in any instance index", "orphan:".yellow(), oid);
    }
    for entry in &report.dangling {
        println!(
            "  {} {} is listed in {} but has no record",
            "dangling:".red(),
            entry.oid,
            entry.type_key.bold()
        );
    }
    for record in &report.unreadable {
        println!("  {} {}: {}", "unreadable:".red(), record.path, record.reason);
    }
    println!("{} {} issue(s) found.", "✗".red().bold(), report.finding_count());
}
