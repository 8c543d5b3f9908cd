mod error;
mod input;
mod logging;
mod model;
mod pipeline;
mod report;
mod similarity;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::Value;
use tracing::info;

use crate::error::ElispotError;
use crate::input::assignment::{AssignmentRecord, read_assignments, records_to_assignments};
use crate::input::peptides::read_peptides;
use crate::input::readout::read_readout;
use crate::input::request::Request;
use crate::model::assignment::PlateSize;
use crate::model::deconvolution::DeconvolutionMethod;
use crate::model::params::{
    DEFAULT_COVERAGE, DEFAULT_MAX_ITERATIONS, DEFAULT_MIN_COVERAGE,
    DEFAULT_MIN_POSITIVE_SPOT_COUNT, DEFAULT_PEPTIDES_PER_POOL, DEFAULT_RANDOM_SEED,
    DEFAULT_SIMILARITY_THRESHOLD, DeconvolveParams, GenerateParams, InitStrategy,
};
use crate::model::peptide::PeptideSource;
use crate::model::readout::SpotCount;
use crate::pipeline::identify::identify;
use crate::pipeline::verify::verify;
use crate::pipeline::{deconvolve, generate};
use crate::report::columnar::from_columnar;
use crate::report::format_f64_6;
use crate::report::json::{
    deconvolution_response, design_response, error_response, identification_response,
    render_summary_json,
};
use crate::report::text::{
    render_deconvolution_report, render_design_report, render_verification_report,
};
use crate::report::tsv::{DeconvolutionRow, write_tsv};
use crate::similarity::{SimilarityFunction, find_pairs_above_threshold, score};

#[derive(Debug, Parser)]
#[command(
    name = "kira-elispot",
    version,
    about = "Pooled-peptide ELISpot design generation and hit deconvolution"
)]
struct Cli {
    /// Debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Only warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Assign peptides to pools and plates.
    Generate(GenerateArgs),
    /// Call hit peptides from per-well spot counts.
    Deconvolve(DeconvolveArgs),
    /// List every peptide found in a positive pool.
    Identify(IdentifyArgs),
    /// Check an assignment table against the pooling constraints.
    Verify(VerifyArgs),
    /// Score the similarity of two peptide sequences.
    Score(ScoreArgs),
    /// List peptide pairs scoring above the similarity threshold.
    Pairs(PairsArgs),
    /// Answer a JSON request with a JSON response.
    Request(RequestArgs),
}

#[derive(Debug, Args)]
struct GenerateArgs {
    /// Peptide table with peptide_id and peptide_sequence columns.
    #[arg(long, conflicts_with = "num_peptides", required_unless_present = "num_peptides")]
    peptides: Option<PathBuf>,
    /// Number of peptides when sequences are not available.
    #[arg(long)]
    num_peptides: Option<usize>,
    #[arg(long, default_value_t = DEFAULT_PEPTIDES_PER_POOL)]
    peptides_per_pool: usize,
    #[arg(long, default_value_t = DEFAULT_COVERAGE)]
    coverage: usize,
    /// 24, 48, 96, 384 or do_not_assign.
    #[arg(long, default_value = "96")]
    plate_size: PlateSize,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    cluster_peptides: bool,
    #[arg(long, default_value = "euclidean")]
    similarity_function: SimilarityFunction,
    #[arg(long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
    similarity_threshold: f64,
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,
    #[arg(long, default_value = "greedy")]
    init_strategy: InitStrategy,
    #[arg(long)]
    allow_extra_pools: bool,
    #[arg(long, default_value_t = DEFAULT_RANDOM_SEED)]
    seed: u64,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct DeconvolveArgs {
    #[arg(long)]
    assignments: PathBuf,
    /// Spot counts keyed by plate_id/well_id or by pool_id.
    #[arg(long)]
    spot_counts: PathBuf,
    #[arg(long, default_value = "cem")]
    method: DeconvolutionMethod,
    #[arg(long, default_value_t = DEFAULT_MIN_COVERAGE)]
    min_coverage: usize,
    #[arg(long, default_value_t = DEFAULT_MIN_POSITIVE_SPOT_COUNT)]
    min_positive_spot_count: f64,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct IdentifyArgs {
    #[arg(long)]
    counts: PathBuf,
    #[arg(long)]
    configuration: PathBuf,
    #[arg(long, default_value_t = DEFAULT_MIN_POSITIVE_SPOT_COUNT)]
    min_positive_spot_count: f64,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct VerifyArgs {
    #[arg(long)]
    assignments: PathBuf,
    #[arg(long, default_value_t = DEFAULT_PEPTIDES_PER_POOL)]
    peptides_per_pool: usize,
    #[arg(long, default_value_t = DEFAULT_COVERAGE)]
    coverage: usize,
}

#[derive(Debug, Args)]
struct ScoreArgs {
    sequence_a: String,
    sequence_b: String,
    #[arg(long, default_value = "euclidean")]
    similarity_function: SimilarityFunction,
}

#[derive(Debug, Args)]
struct PairsArgs {
    #[arg(long)]
    peptides: PathBuf,
    #[arg(long, default_value = "euclidean")]
    similarity_function: SimilarityFunction,
    #[arg(long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
    similarity_threshold: f64,
    /// TSV output path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct RequestArgs {
    #[arg(long)]
    input: PathBuf,
    /// Defaults to stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);
    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the command ran but reported a failed check.
fn run(cli: &Cli) -> Result<bool, ElispotError> {
    match &cli.command {
        Command::Generate(args) => run_generate(args).map(|_| true),
        Command::Deconvolve(args) => run_deconvolve(args).map(|_| true),
        Command::Identify(args) => run_identify(args).map(|_| true),
        Command::Verify(args) => run_verify(args),
        Command::Score(args) => run_score(args).map(|_| true),
        Command::Pairs(args) => run_pairs(args).map(|_| true),
        Command::Request(args) => run_request(args).map(|_| true),
    }
}

fn generate_params(args: &GenerateArgs) -> GenerateParams {
    GenerateParams {
        peptides_per_pool: args.peptides_per_pool,
        coverage: args.coverage,
        plate_size: args.plate_size,
        cluster_peptides: args.cluster_peptides,
        similarity_function: args.similarity_function,
        similarity_threshold: args.similarity_threshold,
        max_iterations: args.max_iterations,
        init_strategy: args.init_strategy,
        allow_extra_pools: args.allow_extra_pools,
        seed: args.seed,
    }
}

fn run_generate(args: &GenerateArgs) -> Result<(), ElispotError> {
    let source = match (&args.peptides, args.num_peptides) {
        (Some(path), _) => PeptideSource::Sequences(read_peptides(path)?),
        (None, Some(n)) => PeptideSource::Count(n),
        (None, None) => {
            return Err(ElispotError::invalid_parameter(
                "peptides",
                "",
                "provide --peptides or --num-peptides",
            ));
        }
    };
    let design = generate(source, &generate_params(args))?;

    fs::create_dir_all(&args.out)?;
    write_tsv(&args.out.join("assignments.tsv"), &design.assignments)?;
    write_tsv(
        &args.out.join("assignments_bench_ready.tsv"),
        &design.bench_ready,
    )?;
    write_tsv(
        &args.out.join("preferred_peptide_pairs.tsv"),
        &design.preferred_pairs,
    )?;
    fs::write(
        args.out.join("summary.json"),
        render_summary_json("generate", &design.metadata)?,
    )?;
    fs::write(
        args.out.join("report.txt"),
        render_design_report(&design.metadata, &design.preferred_pairs),
    )?;
    info!(out = %args.out.display(), "design written");
    Ok(())
}

fn run_deconvolve(args: &DeconvolveArgs) -> Result<(), ElispotError> {
    let assignments = read_assignments(&args.assignments)?;
    let spot_counts = read_readout(&args.spot_counts)?;
    let params = DeconvolveParams {
        method: args.method,
        min_coverage: args.min_coverage,
        min_positive_spot_count: args.min_positive_spot_count,
    };
    let result = deconvolve(&assignments, &spot_counts, &params)?;

    fs::create_dir_all(&args.out)?;
    let rows = result
        .results
        .iter()
        .map(DeconvolutionRow::from)
        .collect::<Vec<_>>();
    write_tsv(&args.out.join("deconvolution.tsv"), &rows)?;
    fs::write(
        args.out.join("summary.json"),
        render_summary_json("deconvolve", &result.summary)?,
    )?;
    fs::write(
        args.out.join("report.txt"),
        render_deconvolution_report(&result.summary, &result.results),
    )?;
    info!(out = %args.out.display(), "deconvolution written");
    Ok(())
}

fn run_identify(args: &IdentifyArgs) -> Result<(), ElispotError> {
    let configuration = read_assignments(&args.configuration)?;
    let readout = read_readout(&args.counts)?;
    let identification = identify(&configuration, &readout, args.min_positive_spot_count)?;

    fs::create_dir_all(&args.out)?;
    write_tsv(
        &args.out.join("hit_peptide_summary.tsv"),
        &identification.hit_peptide_summary,
    )?;
    write_tsv(
        &args.out.join("elispot_configuration.tsv"),
        &identification.elispot_configuration,
    )?;
    write_tsv(
        &args.out.join("plate_readout.tsv"),
        &identification.plate_readout,
    )?;
    info!(out = %args.out.display(), "identification written");
    Ok(())
}

fn run_verify(args: &VerifyArgs) -> Result<bool, ElispotError> {
    let assignments = read_assignments(&args.assignments)?;
    let report = verify(&assignments, args.peptides_per_pool, args.coverage);
    print!("{}", render_verification_report(&report));
    Ok(report.all_passed())
}

fn run_score(args: &ScoreArgs) -> Result<(), ElispotError> {
    let similarity = score(&args.sequence_a, &args.sequence_b, args.similarity_function)?;
    println!("{}", format_f64_6(similarity));
    Ok(())
}

fn run_pairs(args: &PairsArgs) -> Result<(), ElispotError> {
    let peptides = read_peptides(&args.peptides)?;
    let pairs = find_pairs_above_threshold(
        &peptides,
        args.similarity_threshold,
        args.similarity_function,
    )?;
    write_tsv(&args.out, &pairs)?;
    info!(pairs = pairs.len(), out = %args.out.display(), "similar pairs written");
    Ok(())
}

fn handle_request(request: Request) -> Result<Value, ElispotError> {
    match request {
        Request::Generate(req) => {
            let (source, params) = req.into_parts()?;
            let design = generate(source, &params)?;
            Ok(design_response(&design)?)
        }
        Request::Deconvolve(req) => {
            let params = req.params()?;
            let records: Vec<AssignmentRecord> = from_columnar(&req.assignments)?;
            let assignments = records_to_assignments(records)
                .map_err(ElispotError::DeconvolutionInputMismatch)?;
            let spot_counts: Vec<SpotCount> = from_columnar(&req.spot_counts)?;
            let result = deconvolve(&assignments, &spot_counts, &params)?;
            Ok(deconvolution_response(&result)?)
        }
        Request::Identify(req) => {
            let configuration = read_assignments(&req.configuration_path)?;
            let readout = read_readout(&req.counts_path)?;
            let identification =
                identify(&configuration, &readout, req.min_positive_spot_count)?;
            Ok(identification_response(&identification)?)
        }
    }
}

fn answer_request(input: &Path) -> (Value, Result<(), ElispotError>) {
    let outcome = fs::read_to_string(input)
        .map_err(ElispotError::from)
        .and_then(|text| serde_json::from_str::<Request>(&text).map_err(ElispotError::from))
        .and_then(handle_request);
    match outcome {
        Ok(body) => (body, Ok(())),
        Err(err) => (error_response(&err), Err(err)),
    }
}

fn run_request(args: &RequestArgs) -> Result<(), ElispotError> {
    let (body, outcome) = answer_request(&args.input);
    let text = serde_json::to_string_pretty(&body)?;
    match &args.output {
        Some(path) => fs::write(path, text)?,
        None => println!("{text}"),
    }
    outcome
}

#[cfg(test)]
#[path = "../tests/src_inline/main_inline.rs"]
mod tests;
