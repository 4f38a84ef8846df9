use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use udm_mapgen::classify::{Classification, PathClassifier};
use udm_mapgen::codegen::{self, Bucket, FieldMapping, GenerationStats};
use udm_mapgen::error::{Error, Result};
use udm_mapgen::hydrate::{self, HydratedNode, TreeFilter};
use udm_mapgen::sample::{SampleField, extract_fields};
use udm_mapgen::schema::{self, Root, TypeCatalog};

/// Explore the UDM schema and generate parser mappings for it.
///
/// Uses the bundled UDM catalog unless --catalog points at another catalog
/// document.
#[derive(Parser)]
#[command(name = "udm-mapgen", version, about)]
struct Cli {
    /// Catalog document to load instead of the bundled one.
    #[arg(long, global = true, env = "UDM_MAPGEN_CATALOG")]
    catalog: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a hydrated root schema as a tree.
    Tree {
        /// Root schema to print.
        #[arg(long, default_value = "event")]
        root: Root,

        /// Keep only fields whose name contains this text, plus their ancestors.
        #[arg(long)]
        search: Option<String>,

        /// Keep only key fields for this use case, plus their ancestors.
        #[arg(long)]
        use_case: Option<String>,

        /// Stop printing below this depth.
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Classify a dotted target path and show the field it resolves to.
    Classify {
        /// Target path, e.g. "security_result.rule_name".
        path: String,

        /// Print the classification as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the fields found in a JSON log sample.
    Fields {
        /// JSON sample file.
        #[arg(long)]
        sample: PathBuf,
    },

    /// Generate a parser configuration from field mappings.
    Generate {
        /// JSON array of mappings: [{"source_path", "target_path", "source_value_kind"}].
        #[arg(long)]
        mappings: Option<PathBuf>,

        /// A single SOURCE=TARGET mapping. May be repeated.
        ///
        /// Example: --map src_ip=principal.ip --map ts=metadata.event_timestamp
        #[arg(long = "map", value_name = "SOURCE=TARGET")]
        maps: Vec<String>,

        /// JSON sample the --map source kinds are inferred from.
        #[arg(long)]
        sample: Option<PathBuf>,

        /// Write the configuration here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Suppress non-error output.
        #[arg(long, short)]
        quiet: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");

        // Print cause chain.
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = std::error::Error::source(cause);
        }

        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!("udm_mapgen={level}"))
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let catalog = load_catalog(cli.catalog.as_deref())?;

    match cli.command {
        Commands::Tree {
            root,
            search,
            use_case,
            max_depth,
        } => {
            let tree = hydrate::hydrate_schema(&catalog);
            let filter = TreeFilter { search, use_case };
            match tree.root(root).filtered(&filter) {
                Some(node) => {
                    let mut out = String::new();
                    write_tree(&node, 0, max_depth, &mut out);
                    print!("{out}");
                }
                None => eprintln!("No fields match the filter."),
            }
        }

        Commands::Classify { path, json } => {
            let classifier = PathClassifier::new(&catalog);
            let classification = classifier.classify(&path);
            if json {
                println!("{}", serde_json::to_string_pretty(&classification)?);
            } else {
                print_classification(&path, &classification);
                if let Some(field) = classifier.resolve(&path) {
                    if !field.description.is_empty() {
                        println!("description:        {}", field.description);
                    }
                    if !field.enum_values.is_empty() {
                        println!("enum values:        {}", field.enum_values.join(", "));
                    }
                    if !field.key_field_use_cases.is_empty() {
                        let use_cases: Vec<_> =
                            field.key_field_use_cases.iter().map(String::as_str).collect();
                        println!("key field for:      {}", use_cases.join(", "));
                    }
                }
                if let Some(template) = &classification.mapping_template {
                    println!("mapping template:");
                    for line in template.lines() {
                        println!("    {line}");
                    }
                }
            }
        }

        Commands::Fields { sample } => {
            let fields = load_sample_fields(&sample)?;
            for field in &fields {
                println!("{}\t{}\t{}", field.path, field.kind, field.value);
            }
            eprintln!("{} fields", fields.len());
        }

        Commands::Generate {
            mappings,
            maps,
            sample,
            output,
            quiet,
        } => {
            let fields = match &sample {
                Some(path) => load_sample_fields(path)?,
                None => Vec::new(),
            };

            let mut all = match &mappings {
                Some(path) => {
                    let content = read_file(path)?;
                    serde_json::from_str::<Vec<FieldMapping>>(&content)?
                }
                None => Vec::new(),
            };
            for arg in &maps {
                let parsed: FieldMapping = arg.parse()?;
                all.push(FieldMapping::from_sample(
                    &fields,
                    parsed.source_path,
                    parsed.target_path,
                ));
            }

            if !quiet {
                eprintln!(
                    "Generating parser for {} mappings against catalog {}",
                    all.len(),
                    catalog.version().unwrap_or("(unversioned)")
                );
            }

            let generated = codegen::generate(&all, &PathClassifier::new(&catalog));

            match &output {
                Some(path) => std::fs::write(path, &generated.text).map_err(|e| Error::Write {
                    path: path.clone(),
                    source: e,
                })?,
                None => print!("{}", generated.text),
            }

            if !quiet {
                print_stats(&generated.stats);
                if let Some(path) = &output {
                    eprintln!("Wrote {}", path.display());
                }
                eprintln!("Done.");
            }
        }
    }

    Ok(())
}

fn load_catalog(path: Option<&Path>) -> Result<TypeCatalog> {
    let catalog = match path {
        Some(path) => schema::load_catalog(path)?,
        None => schema::builtin_catalog()?,
    };
    tracing::info!(
        version = catalog.version().unwrap_or_default(),
        records = catalog.len(),
        "catalog loaded"
    );
    Ok(catalog)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

/// A malformed sample is reported and treated as having no fields.
fn load_sample_fields(path: &Path) -> Result<Vec<SampleField>> {
    match extract_fields(&read_file(path)?) {
        Ok(fields) => Ok(fields),
        Err(e @ Error::Sample(_)) => {
            eprintln!("{}: {e}; continuing with no sample fields", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

fn write_tree(node: &HydratedNode<'_>, depth: usize, max_depth: Option<usize>, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(node.name());
    if node.is_repeated() {
        out.push_str("[]");
    }
    if let Some(type_name) = node.type_name() {
        out.push_str(": ");
        out.push_str(type_name);
    }
    if node.cycle_cut {
        out.push_str(" (recursive)");
    }
    out.push('\n');

    if max_depth.is_some_and(|max| depth >= max) {
        return;
    }
    for child in &node.children {
        write_tree(child, depth + 1, max_depth, out);
    }
}

fn print_classification(path: &str, c: &Classification) {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    println!("target:             {path}");
    println!(
        "root:               {}{}",
        c.root,
        if c.root_explicit { "" } else { " (default)" }
    );
    println!("resolved:           {}", yes_no(c.resolved));
    println!("canonical path:     {}", c.canonical_path);
    println!("qualified path:     {}", c.qualified_path);
    println!("repeated:           {}", yes_no(c.is_self_repeated));
    if let (Some(ancestor), Some(relative)) =
        (&c.repeated_ancestor_path, &c.relative_path_from_ancestor)
    {
        println!("repeated ancestor:  {ancestor}");
        println!("relative path:      {relative}");
    }
    if c.is_multi_level_repeated() {
        println!(
            "deeper repeated:    {}",
            c.deeper_repeated_ancestors.join(", ")
        );
    }
    if let Some(value_type) = c.declared_type {
        println!("declared type:      {value_type}");
    }
}

fn print_stats(stats: &GenerationStats) {
    eprintln!("Generated {} mappings", stats.mappings_generated);
    for bucket in Bucket::OUTPUT_ORDER {
        let count = stats.count(bucket);
        if count > 0 {
            eprintln!("  {bucket}: {count}");
        }
    }
    if stats.empty_targets_skipped > 0 {
        eprintln!(
            "Skipped {} mappings without a target path",
            stats.empty_targets_skipped
        );
    }
    if stats.duplicate_sources_skipped > 0 {
        eprintln!(
            "Skipped {} mappings whose source key is already mapped",
            stats.duplicate_sources_skipped
        );
    }
    if stats.unresolved_targets > 0 {
        eprintln!(
            "{} target paths are not in the catalog",
            stats.unresolved_targets
        );
    }
    if stats.multi_level_repeated > 0 {
        eprintln!(
            "{} mappings sit under multi-level repeated fields and need manual work",
            stats.multi_level_repeated
        );
    }
}
