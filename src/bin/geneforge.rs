//! GeneForge CLI: validate guide sequences and predict edits
//!
//! Commands:
//!   geneforge validate  check a sequence without predicting
//!   geneforge simulate  run the offline simulated predictor
//!   geneforge predict   run the configured predictor (simulation or remote)
//!   geneforge config    print the effective configuration as JSON

use geneforge_core::predict::{EditContext, PredictionResult, SimulationRules};
use geneforge_core::render::{compute_display_segments, efficiency_gauge, highlight, marker_line};
use geneforge_core::service::{BackendConfig, PredictionService, ServiceConfig, SubmitError};
use geneforge_core::validate;
use std::env;
use std::process::ExitCode;

const GAUGE_WIDTH: usize = 30;

fn print_usage() {
    println!(
        r#"
GeneForge: guide sequence edit prediction

Usage: geneforge <command> [options]

Commands:
  validate <sequence>                         Check a 20-base A/T/C/G sequence
  simulate <sequence> [--seed N]              Predict with the offline simulator
  predict  <sequence> [options]               Predict with the configured backend
  config   [--config FILE]                    Print the effective configuration

Predict options:
  --config FILE      JSON service config (default: built-in simulation)
  --remote URL       Use the model server at URL
  --route PATH       Predict route on the server (default: /predict)
  --timeout SECS     Per-prediction timeout (default: 10)
  --disease NAME     Pass-through context fields sent to the server
  --target SEQ
  --pam SEQ
  --guide SEQ
  --donor SEQ
  --cell-type NAME

Environment:
  GENEFORGE_PREDICT_URL, GENEFORGE_PREDICT_ROUTE, GENEFORGE_TIMEOUT_SECS
  RUST_LOG (default: info)

Examples:
  geneforge validate atcgatcgatcgatcgatcg
  geneforge simulate AAAAAAAAAAAAAAAAAAAA --seed 7
  geneforge predict CTACTTCAAATGGGGCTACA --remote http://localhost:8000
"#
    );
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let ok = match args[1].as_str() {
        "validate" => cmd_validate(&args[2..]),
        "simulate" => cmd_simulate(&args[2..]).await,
        "predict" => cmd_predict(&args[2..]).await,
        "config" => cmd_config(&args[2..]),
        "help" | "--help" | "-h" => {
            print_usage();
            true
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            false
        }
    };
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Value following `flag`, e.g. `--seed 7`
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

/// First argument that is neither a flag nor a flag's value
fn positional(args: &[String]) -> Option<&str> {
    let mut skip = false;
    for a in args {
        if skip {
            skip = false;
            continue;
        }
        if a.starts_with("--") {
            skip = true;
            continue;
        }
        return Some(a.as_str());
    }
    None
}

fn cmd_validate(args: &[String]) -> bool {
    let Some(input) = positional(args) else {
        eprintln!("Usage: geneforge validate <sequence>");
        return false;
    };
    match validate(input) {
        Ok(seq) => {
            println!("\n  Valid: {}", seq);
            true
        }
        Err(e) => {
            eprintln!("\n  Invalid: {}", e);
            false
        }
    }
}

async fn cmd_simulate(args: &[String]) -> bool {
    let Some(input) = positional(args) else {
        eprintln!("Usage: geneforge simulate <sequence> [--seed N]");
        return false;
    };
    let seed = match flag_value(args, "--seed").map(str::parse::<u64>) {
        Some(Ok(seed)) => Some(seed),
        Some(Err(_)) => {
            eprintln!("  --seed must be a non-negative integer");
            return false;
        }
        None => None,
    };
    let config = ServiceConfig {
        backend: BackendConfig::Simulation {
            rules: SimulationRules::default(),
            seed,
        },
        ..ServiceConfig::default()
    };
    run(&config, input, EditContext::default()).await
}

async fn cmd_predict(args: &[String]) -> bool {
    let Some(input) = positional(args) else {
        eprintln!("Usage: geneforge predict <sequence> [options]");
        return false;
    };
    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("  {}", e);
            return false;
        }
    };
    let context = EditContext {
        disease: flag_value(args, "--disease").map(String::from),
        target_sequence: flag_value(args, "--target").map(String::from),
        pam_sequence: flag_value(args, "--pam").map(String::from),
        guide_rna: flag_value(args, "--guide").map(String::from),
        donor_template: flag_value(args, "--donor").map(String::from),
        cell_type: flag_value(args, "--cell-type").map(String::from),
    };
    run(&config, input, context).await
}

fn cmd_config(args: &[String]) -> bool {
    match load_config(args).and_then(|c| serde_json::to_string_pretty(&c).map_err(|e| e.to_string())) {
        Ok(json) => {
            println!("{}", json);
            true
        }
        Err(e) => {
            eprintln!("  {}", e);
            false
        }
    }
}

/// File config, then environment, then command-line flags
fn load_config(args: &[String]) -> Result<ServiceConfig, String> {
    let mut config = match flag_value(args, "--config") {
        Some(path) => ServiceConfig::load(path).map_err(|e| e.to_string())?,
        None => ServiceConfig::default(),
    };
    config = config.with_env_overrides().map_err(|e| e.to_string())?;

    if let Some(url) = flag_value(args, "--remote") {
        config = config.with_remote_url(url);
    }
    if let Some(route) = flag_value(args, "--route") {
        config = config.with_route(route).map_err(|e| e.to_string())?;
    }
    if let Some(raw) = flag_value(args, "--timeout") {
        let secs = raw.parse().map_err(|_| format!("--timeout must be a number of seconds, got '{}'", raw))?;
        config.timeout_secs = Some(secs);
    }
    Ok(config)
}

async fn run(config: &ServiceConfig, input: &str, context: EditContext) -> bool {
    let service = match PredictionService::from_config(config) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("  {}", e);
            return false;
        }
    };
    println!("\n  Predicting with '{}' backend...", service.backend_name());
    match service.submit_with(input, context).await {
        Ok(result) => {
            print_result(&result);
            true
        }
        Err(SubmitError::Invalid(e)) => {
            eprintln!("\n  Invalid sequence: {}", e);
            false
        }
        Err(SubmitError::Failed(e)) => {
            eprintln!("\n  Prediction failed: {}", e.user_message());
            false
        }
        Err(e) => {
            eprintln!("\n  {}", e);
            false
        }
    }
}

fn print_result(result: &PredictionResult) {
    let segments = compute_display_segments(result);
    println!("\n  Prediction Results");
    println!("  {}", "=".repeat(40));
    println!("  Original:    {}", result.original_sequence);
    println!("  Edited:      {}", result.edited_sequence);
    println!("               {}", marker_line(&segments));
    println!("  Diff:        {}", highlight(&segments));
    if let (Some(pos), Some(from), Some(to)) = (result.changed_position, result.original_base, result.new_base) {
        println!("  Change:      position {}: {} -> {}", pos, from, to);
    }
    println!("  Efficiency:  {}", efficiency_gauge(result.efficiency, GAUGE_WIDTH));
    if let Some(original) = result.original_efficiency {
        println!("  Before edit: {:.0}%", original);
    }
    if let Some(message) = &result.message {
        println!("  {}", message);
    }
    if !result.off_targets.is_empty() {
        println!("\n  Off-Target Alerts:");
        for target in &result.off_targets {
            println!("  - {} ({:?} risk)", target.site, target.risk);
        }
    }
    if let Some(summary) = &result.therapeutic_summary {
        println!("\n  Therapeutic Report:\n  {}", summary);
    }
}
