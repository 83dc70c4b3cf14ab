//! drs-inspect: look inside DRS/BMG archives and write them back out.

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use drs_codec::archive::{self, Archetype, LoadedArchive, ReadOptions, WriteOptions};

#[derive(Parser)]
#[command(name = "drs-inspect")]
#[command(author, version, about = "Inspect and re-save DRS/BMG model archives", long_about = None)]
struct Cli {
    /// Abort on the first malformed record instead of skipping it
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header, index table, hierarchy and decoded records
    Info {
        file: PathBuf,
    },

    /// Print the decoded record tree as JSON
    Dump {
        file: PathBuf,
    },

    /// Load an archive and write it back through the two-pass writer
    Resave {
        input: PathBuf,
        output: PathBuf,

        /// Archetype to lay the output out as (inferred from the records when omitted)
        #[arg(long, value_parser = parse_archetype)]
        archetype: Option<Archetype>,
    },
}

fn parse_archetype(name: &str) -> Result<Archetype, String> {
    Archetype::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = Archetype::ALL.iter().map(|a| a.name()).collect();
        format!("unknown archetype '{}', expected one of {}", name, known.join(", "))
    })
}

fn load(path: &PathBuf, strict: bool) -> anyhow::Result<LoadedArchive> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let options = ReadOptions {
        strict,
        ..ReadOptions::default()
    };
    archive::read_archive(&bytes, &options).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_info(loaded: &LoadedArchive) {
    let header = &loaded.header;
    println!(
        "header: models {}, index at {}, hierarchy at {}, {} nodes",
        header.model_count, header.index_table_offset, header.hierarchy_offset, header.node_count
    );

    println!("index table:");
    for (i, entry) in loaded.index.entries.iter().enumerate() {
        let kind = entry.kind().map_or_else(|| "?".to_string(), |k| k.to_string());
        println!(
            "  [{:2}] {:<24} id {:2}  offset {:8}  size {:8}  linked {}",
            i + 1,
            kind,
            entry.identifier,
            entry.offset,
            entry.size,
            entry.linked_node
        );
    }

    println!("hierarchy:");
    for node in &loaded.hierarchy.nodes {
        println!("  {:<24} -> slot {}", node.name, node.info_index);
    }

    println!("records:");
    for kind in loaded.tree.kinds() {
        println!("  {}", kind);
    }
    if !loaded.skipped.is_empty() {
        println!("skipped:");
        for skipped in &loaded.skipped {
            println!("  {} (slot {}): {}", skipped.node, skipped.info_index, skipped.reason);
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { file } => {
            let loaded = load(&file, cli.strict)?;
            print_info(&loaded);
        }

        Commands::Dump { file } => {
            let loaded = load(&file, cli.strict)?;
            let json = serde_json::to_string_pretty(&loaded.tree).context("failed to serialise record tree")?;
            println!("{json}");
        }

        Commands::Resave {
            input,
            output,
            archetype,
        } => {
            let loaded = load(&input, cli.strict)?;
            let archetype = match archetype {
                Some(archetype) => archetype,
                None => Archetype::infer(&loaded.tree)
                    .ok_or_else(|| anyhow!("no archetype covers the records in {}", input.display()))?,
            };
            let options = WriteOptions {
                model_count: loaded.header.model_count,
            };
            let bytes = archive::write_archive(&loaded.tree, archetype, &options)
                .with_context(|| format!("failed to encode {} as {}", input.display(), archetype))?;
            std::fs::write(&output, &bytes).with_context(|| format!("failed to write {}", output.display()))?;
            println!("{} -> {} ({}, {} bytes)", input.display(), output.display(), archetype, bytes.len());
        }
    }

    Ok(())
}
