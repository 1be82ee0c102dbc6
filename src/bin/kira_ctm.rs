use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use kira_celltype_mapper::classmap::{ClassMap, classmap_options};
use kira_celltype_mapper::config::{ConfigLoader, ResolvedConfig};
use kira_celltype_mapper::domain::{AnatomyFallback, NodeId, Organism};
use kira_celltype_mapper::error::KiraError;
use kira_celltype_mapper::fetch::{HttpOntologyFetcher, fetch_release};
use kira_celltype_mapper::matcher::{CelltypeMatcher, MatchOptions, query_lines};
use kira_celltype_mapper::ontology::OntologyGraph;
use kira_celltype_mapper::output::JsonOutput;
use kira_celltype_mapper::source::{BuiltinSource, DirectorySource, OntologySource};
use kira_celltype_mapper::store::OntologyStore;

#[derive(Parser)]
#[command(name = "kira-ctm")]
#[command(about = "Map free-text cell-type labels onto the Cell Ontology")]
#[command(version, author)]
struct Cli {
    /// JSON config file (defaults to ./kira-ctm.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Read ontologies from this store instead of the built-in releases
    #[arg(long, global = true)]
    ontology_dir: Option<Utf8PathBuf>,

    /// Read ontologies from the default cache store
    #[arg(long, global = true, conflicts_with = "ontology_dir")]
    cached: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Suggest ontology terms for free-text labels")]
    Match(MatchArgs),
    #[command(about = "Prepare or clean class-map tables")]
    Classmap(ClassmapArgs),
    #[command(about = "Inspect ontology releases")]
    Ontology(OntologyArgs),
    #[command(about = "Download a Cell Ontology release into the cache store")]
    Fetch(FetchArgs),
}

#[derive(Args, Clone, Default)]
struct OrganismArgs {
    #[arg(long)]
    organism: Option<String>,

    #[arg(long)]
    ontology_version: Option<String>,
}

#[derive(Args, Clone, Default)]
struct MatchFlags {
    #[arg(long)]
    anatomy: Option<String>,

    #[arg(long, value_enum)]
    anatomy_fallback: Option<AnatomyFallback>,

    #[arg(long)]
    no_synonyms: bool,

    #[arg(long = "omit-target")]
    omit_target: Vec<String>,

    #[arg(long)]
    n_suggest: Option<usize>,

    #[arg(long)]
    partial_threshold: Option<f64>,
}

#[derive(Args)]
struct MatchArgs {
    queries: Vec<String>,

    /// Read additional queries from a file, one per line
    #[arg(long)]
    from_file: Option<Utf8PathBuf>,

    #[command(flatten)]
    target: OrganismArgs,

    #[command(flatten)]
    flags: MatchFlags,

    /// Return a query unchanged when it already is an ontology term
    #[arg(long)]
    perfect_only: bool,

    #[arg(long)]
    keep_strategy: bool,

    #[arg(long)]
    always_list: bool,
}

#[derive(Args)]
struct ClassmapArgs {
    #[command(subcommand)]
    command: ClassmapCommand,
}

#[derive(Subcommand)]
enum ClassmapCommand {
    #[command(about = "Write a class map for the labels in a file")]
    Prepare(PrepareArgs),
    #[command(about = "Validate a class map and add ontology ids")]
    Clean(CleanArgs),
}

#[derive(Args)]
struct PrepareArgs {
    #[arg(long)]
    input: Utf8PathBuf,

    #[arg(long)]
    output: Utf8PathBuf,

    #[command(flatten)]
    target: OrganismArgs,

    #[command(flatten)]
    flags: MatchFlags,

    /// Overwrite an existing class map
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct CleanArgs {
    #[arg(long)]
    input: Utf8PathBuf,

    #[command(flatten)]
    target: OrganismArgs,
}

#[derive(Args)]
struct OntologyArgs {
    #[command(subcommand)]
    command: OntologyCommand,
}

#[derive(Subcommand)]
enum OntologyCommand {
    #[command(about = "List available releases")]
    Versions(OrganismArgs),
    #[command(about = "Show release statistics")]
    Info(OrganismArgs),
    #[command(about = "Show parents, children, ancestors and descendants of a term")]
    Lineage(LineageArgs),
}

#[derive(Args)]
struct LineageArgs {
    /// Term id or exact name
    term: String,

    #[command(flatten)]
    target: OrganismArgs,
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long)]
    organism: String,

    #[arg(long)]
    ontology_version: String,

    #[arg(long)]
    force: bool,
}

#[derive(Serialize)]
struct VersionsResult {
    organism: String,
    versions: Vec<String>,
}

#[derive(Serialize)]
struct LineageResult {
    id: String,
    name: String,
    synonyms: Vec<String>,
    parents: Vec<String>,
    children: Vec<String>,
    ancestors: Vec<String>,
    descendants: Vec<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::UnknownOrganism(_)
        | KiraError::UnknownVersion { .. }
        | KiraError::UnresolvedAnatomy(_)
        | KiraError::UnknownNode(_)
        | KiraError::InvalidOrganism(_)
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_) => 2,
        KiraError::OntologyHttp(_) | KiraError::OntologyStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let source = select_source(&cli, &config)?;

    match cli.command {
        Commands::Match(args) => run_match(args, &config, source.as_ref()),
        Commands::Classmap(args) => run_classmap(args, &config, source.as_ref()),
        Commands::Ontology(args) => run_ontology(args, &config, source.as_ref()),
        Commands::Fetch(args) => run_fetch(args, &cli.ontology_dir),
    }
}

fn select_source(cli: &Cli, config: &ResolvedConfig) -> miette::Result<Box<dyn OntologySource>> {
    let dir = cli.ontology_dir.clone().or_else(|| config.ontology_dir.clone());
    if let Some(dir) = dir {
        return Ok(Box::new(DirectorySource::new(OntologyStore::new_with_root(dir))));
    }
    if cli.cached {
        return Ok(Box::new(DirectorySource::new(OntologyStore::new()?)));
    }
    Ok(Box::new(BuiltinSource))
}

fn resolve_organism(args: &OrganismArgs, config: &ResolvedConfig) -> miette::Result<Organism> {
    match (&args.organism, &config.organism) {
        (Some(value), _) => Ok(value.parse()?),
        (None, Some(organism)) => Ok(organism.clone()),
        (None, None) => Err(miette::Report::msg(
            "organism required (pass --organism or set it in kira-ctm.json)",
        )),
    }
}

fn apply_flags(options: &mut MatchOptions, target: &OrganismArgs, flags: &MatchFlags) {
    if let Some(version) = &target.ontology_version {
        options.version = Some(version.clone());
    }
    if let Some(anatomy) = &flags.anatomy {
        options.anatomical_constraint = Some(anatomy.clone());
    }
    if let Some(fallback) = flags.anatomy_fallback {
        options.anatomy_fallback = fallback;
    }
    if flags.no_synonyms {
        options.include_synonyms = false;
    }
    if !flags.omit_target.is_empty() {
        options.omit_target_list = flags.omit_target.clone();
    }
    if let Some(n) = flags.n_suggest {
        options.n_suggest = n;
    }
    if let Some(threshold) = flags.partial_threshold {
        options.threshold_for_partial_matching = threshold;
    }
}

fn build_graph(
    source: &dyn OntologySource,
    organism: &Organism,
    version: Option<&str>,
) -> miette::Result<OntologyGraph> {
    Ok(OntologyGraph::build(source, organism, version)?)
}

fn run_match(
    args: MatchArgs,
    config: &ResolvedConfig,
    source: &dyn OntologySource,
) -> miette::Result<()> {
    let organism = resolve_organism(&args.target, config)?;
    let mut options = config.options.clone();
    apply_flags(&mut options, &args.target, &args.flags);
    if args.perfect_only {
        options.choices_for_perfect_match = false;
    }
    options.keep_strategy |= args.keep_strategy;
    options.always_return_list |= args.always_list;

    let mut queries = args.queries;
    if let Some(path) = &args.from_file {
        let text = std::fs::read_to_string(path.as_std_path()).into_diagnostic()?;
        queries.extend(query_lines(&text));
    }
    if queries.is_empty() {
        return Err(miette::Report::msg("at least one query is required"));
    }

    let graph = build_graph(source, &organism, options.version.as_deref())?;
    let matcher = CelltypeMatcher::new(graph, options)?;
    let output = matcher.match_batch(&queries);
    JsonOutput::print(&output).into_diagnostic()?;
    Ok(())
}

fn run_classmap(
    args: ClassmapArgs,
    config: &ResolvedConfig,
    source: &dyn OntologySource,
) -> miette::Result<()> {
    match args.command {
        ClassmapCommand::Prepare(args) => {
            let organism = resolve_organism(&args.target, config)?;
            let mut options = classmap_options(&config.options);
            apply_flags(&mut options, &args.target, &args.flags);
            let text = std::fs::read_to_string(args.input.as_std_path()).into_diagnostic()?;
            let labels = text.lines().collect::<Vec<_>>();

            let graph = build_graph(source, &organism, options.version.as_deref())?;
            let matcher = CelltypeMatcher::new(graph, options)?;
            let map = ClassMap::prepare(&labels, &matcher, &config.omit_list);
            map.write(&args.output, config.protected_writing && !args.force)?;
            JsonOutput::print(&map).into_diagnostic()?;
            Ok(())
        }
        ClassmapCommand::Clean(args) => {
            let organism = resolve_organism(&args.target, config)?;
            let version = args.target.ontology_version.as_deref().or(config.options.version.as_deref());
            let graph = build_graph(source, &organism, version)?;
            let mut map = ClassMap::read(&args.input)?;
            map.clean(&graph, &config.omit_list)?;
            map.write(&args.input, false)?;
            JsonOutput::print(&map).into_diagnostic()?;
            Ok(())
        }
    }
}

fn run_ontology(
    args: OntologyArgs,
    config: &ResolvedConfig,
    source: &dyn OntologySource,
) -> miette::Result<()> {
    match args.command {
        OntologyCommand::Versions(target) => {
            let organism = resolve_organism(&target, config)?;
            let versions = source.versions(&organism)?;
            JsonOutput::print(&VersionsResult {
                organism: organism.to_string(),
                versions,
            })
            .into_diagnostic()?;
        }
        OntologyCommand::Info(target) => {
            let organism = resolve_organism(&target, config)?;
            let graph = build_graph(source, &organism, target.ontology_version.as_deref())?;
            JsonOutput::print(&graph.summary()).into_diagnostic()?;
        }
        OntologyCommand::Lineage(args) => {
            let organism = resolve_organism(&args.target, config)?;
            let graph = build_graph(source, &organism, args.target.ontology_version.as_deref())?;
            let by_id = NodeId::new(args.term.trim());
            let id = if graph.celltypes().get(&by_id).is_some() {
                by_id
            } else {
                graph
                    .lookup_exact(&args.term, true)
                    .cloned()
                    .ok_or_else(|| KiraError::UnknownNode(args.term.clone()))?
            };
            let node = graph.node(&id)?;
            let ancestors = graph.ancestors(&id)?;
            let descendants = graph.descendants(&id)?;
            JsonOutput::print(&LineageResult {
                id: node.id.to_string(),
                name: node.name.clone(),
                synonyms: node.synonyms.clone(),
                parents: sorted_ids(node.parents.iter()),
                children: sorted_ids(node.children.iter()),
                ancestors: sorted_ids(ancestors.iter()),
                descendants: sorted_ids(descendants.iter()),
            })
            .into_diagnostic()?;
        }
    }
    Ok(())
}

fn sorted_ids<'a>(ids: impl Iterator<Item = &'a NodeId>) -> Vec<String> {
    let mut ids = ids.map(NodeId::to_string).collect::<Vec<_>>();
    ids.sort();
    ids
}

fn run_fetch(args: FetchArgs, ontology_dir: &Option<Utf8PathBuf>) -> miette::Result<()> {
    let organism: Organism = args.organism.parse()?;
    let store = match ontology_dir {
        Some(dir) => OntologyStore::new_with_root(dir.clone()),
        None => OntologyStore::new()?,
    };
    let fetcher = HttpOntologyFetcher::new()?;
    let result = fetch_release(&fetcher, &store, &organism, &args.ontology_version, args.force)?;
    JsonOutput::print(&result).into_diagnostic()?;
    Ok(())
}
