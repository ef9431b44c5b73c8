use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "shelf",
    about = "Inspect and maintain a shelf object store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to ./shelf.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Store directory, overriding the configuration
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print one object or collection record
    Show(ShowArgs),
    /// List instances of a type and its subtypes
    Instances(QueryArgs),
    /// Count instances of a type and its subtypes
    Count(QueryArgs),
    /// Allocate a fresh identifier
    NextId(NextIdArgs),
    /// Remove an object or collection
    Remove(RemoveArgs),
    /// Report orphaned records and dangling index entries
    Check,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Identifier, e.g. CUS:1A
    pub oid: String,
}

#[derive(Args)]
pub struct QueryArgs {
    /// Fully-qualified type key
    pub type_key: String,
    /// Only instances whose scalar field equals a value (field=value)
    #[arg(short = 'w', long = "where", value_name = "FIELD=VALUE")]
    pub filters: Vec<String>,
}

#[derive(Args)]
pub struct NextIdArgs {
    /// Format the number as an identifier with this type tag
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Args)]
pub struct RemoveArgs {
    pub oid: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let argv = ["shelf", "count", "org.Customer", "--format", "json", "-v"];
        let cli = Cli::try_parse_from(argv).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::Count(args) => {
                assert_eq!(args.type_key, "org.Customer");
                assert!(args.filters.is_empty());
            }
            _ => panic!("expected count"),
        }
    }

    #[test]
    fn parses_repeated_filters() {
        let cli = Cli::try_parse_from([
            "shelf", "instances", "org.Customer", "-w", "name=Ada", "--where", "city=Oslo",
        ])
        .unwrap();
        match cli.command {
            Command::Instances(args) => assert_eq!(args.filters, vec!["name=Ada", "city=Oslo"]),
            _ => panic!("expected instances"),
        }
    }

    #[test]
    fn next_id_is_kebab_case() {
        let cli = Cli::try_parse_from(["shelf", "next-id", "--tag", "CUS"]).unwrap();
        assert!(matches!(cli.command, Command::NextId(NextIdArgs { tag: Some(_) })));
    }
}
