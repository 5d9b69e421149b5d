//! CSL checker: loads a package folder, dumps it and resolves one aircraft.
//!
//! Usage: cargo run --release --bin csl_check -- <CSL_DIR> <RELATED> <DOC8643> [ICAO [AIRLINE [LIVERY]]] [OPTIONS]
//!
//! Options:
//!   --config <FILE>   JSON configuration (default: built-in defaults)
//!   --default <ICAO>  Type used when nothing matches (default: from config)
//!   --dump            Log every package, model and match table
//!   --preload         Load all geometry first so broken objects are excluded

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use cslmp::asset::{AssetLoader, AssetStore, FileAssetSource, LoaderConfig, ThreadedLoads};
use cslmp::core::{logging, MultiplayerConfig};
use cslmp::csl::{MatchSource, ModelMatcher, PackageIndex};

const FLAGS_WITH_VALUE: [&str; 2] = ["--config", "--default"];

fn main() -> ExitCode {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let positional = positional_args(&args);
    if positional.len() < 3 {
        eprintln!("usage: csl_check <CSL_DIR> <RELATED> <DOC8643> [ICAO [AIRLINE [LIVERY]]] [--config FILE] [--default ICAO] [--dump] [--preload]");
        return ExitCode::from(2);
    }

    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => match MultiplayerConfig::load_sync(&PathBuf::from(&path)) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to load config: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => MultiplayerConfig::default(),
    };
    if let Some(icao) = parse_str_arg(&args, "--default") {
        config.default_icao = icao;
    }
    if args.iter().any(|a| a == "--preload") {
        config.preload_geometry = true;
    }

    let mut loader = match AssetLoader::new(
        LoaderConfig::from(&config),
        Arc::new(AssetStore::new()),
        Arc::new(FileAssetSource),
        &ThreadedLoads,
    ) {
        Ok(loader) => loader,
        Err(e) => {
            log::error!("Could not start asset loader: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let start = Instant::now();
    let (mut index, report) = PackageIndex::load_all(
        &PathBuf::from(&positional[0]),
        &PathBuf::from(&positional[1]),
        &PathBuf::from(&positional[2]),
        &config,
        &mut loader,
    );
    let legacy = index.assign_legacy_indices();
    log::info!(
        "Index built in {:.1} ms: {} packages, {} models, {} legacy slots, {} skipped lines, {} aborted files",
        start.elapsed().as_secs_f64() * 1000.0,
        report.packages,
        index.model_count(),
        legacy.len() - 1,
        report.skipped_lines,
        report.aborted.len()
    );

    // Matching must see which preloaded objects failed
    let mut failed = 0;
    while loader.pending_count() > 0 {
        for result in loader.poll() {
            if result.handle.is_failed() {
                failed += 1;
                log::warn!("Failed to load {}", result.path.display());
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    if report.preload_requests > 0 {
        log::info!("Preloaded {} assets, {} failed", report.preload_requests, failed);
    }
    loader.shutdown();

    if args.iter().any(|a| a == "--dump") {
        index.dump();
    }

    let Some(icao) = positional.get(3) else {
        return if report.is_clean() { ExitCode::SUCCESS } else { ExitCode::FAILURE };
    };
    let airline = positional.get(4).map(String::as_str).unwrap_or("");
    let livery = positional.get(5).map(String::as_str).unwrap_or("");

    // Every legacy model counts as loaded by the host
    let matcher = ModelMatcher::new(&index, &config.default_icao).with_host_model_count(legacy.len());
    match matcher.match_model(icao, airline, livery, true) {
        Some(result) => {
            let model = index.model(result.model);
            let package = index.package(result.model.package);
            let how = match result.source {
                MatchSource::Table(level) => format!("table {:?}", level),
                MatchSource::Equipment(pass) => format!("equipment pass {}", pass),
            };
            let kind = matcher
                .kind_of(&result)
                .map(|kind| format!("{:?}", kind))
                .unwrap_or_default();
            println!(
                "{} {} {} -> {} / {} [{}] via {}{}{}",
                icao,
                airline,
                livery,
                package.map(|p| p.name.as_str()).unwrap_or("?"),
                model.map(|m| m.name.as_str()).unwrap_or("?"),
                kind,
                how,
                if result.livery_accurate { ", livery accurate" } else { "" },
                if result.used_default { ", default type" } else { "" },
            );
            ExitCode::SUCCESS
        }
        None => {
            println!("{} {} {} -> no model", icao, airline, livery);
            ExitCode::FAILURE
        }
    }
}

/// Arguments that are neither flags nor flag values
fn positional_args(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
        } else if FLAGS_WITH_VALUE.contains(&arg.as_str()) {
            skip_next = true;
        } else if !arg.starts_with("--") {
            out.push(arg.clone());
        }
    }
    out
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
