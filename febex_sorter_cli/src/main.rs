use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use libfebex_sorter::config::Config;
use libfebex_sorter::process::{create_subsets, process_subset};
use libfebex_sorter::worker_status::{BarColor, WorkerStatus};

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

fn bar_style(color: &BarColor) -> ProgressStyle {
    let color_name = match color {
        BarColor::CYAN => "cyan",
        BarColor::MAGENTA => "magenta",
        BarColor::RED => "red",
    };
    ProgressStyle::with_template(&format!(
        "{{prefix}} {{msg}} [{{wide_bar:.{color_name}}}] {{pos:>3}}%"
    ))
    .expect("Could not create progress bar style!")
}

fn main() {
    // Create a cli
    let matches = Command::new("febex_sorter_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    match matches.subcommand() {
        Some(("new", _)) => {
            log::info!(
                "Making a template config at {}...",
                config_path.to_string_lossy()
            );

            make_template_config(&config_path);
            log::info!("Done.");
            return;
        }
        _ => (),
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    if let Err(e) = config.validate() {
        log::error!("Config is invalid: {e}");
        return;
    }
    log::info!("Config successfully loaded.");
    log::info!("Data Path: {}", config.data_path.to_string_lossy());
    log::info!("HDF5 Path: {}", config.hdf_path.to_string_lossy());
    let calib_render_text: String = match &config.calibration_path {
        Some(p) => p.to_string_lossy().to_string(),
        None => String::from("None (raw ADC values)"),
    };
    log::info!("Calibration: {calib_render_text}");
    log::info!(
        "First Run: {} Last Run: {}",
        config.first_run_number,
        config.last_run_number
    );
    log::info!("Workers: {}", config.n_workers);
    log::info!("Sort Strategy: {:?}", config.sort_strategy);
    log::info!("EBIS Only: {}", config.ebis_only);
    log::info!("Write Traces: {}", config.write_traces);

    // Spawn the workers, one progress bar each
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let mut workers = Vec::new();
    let mut bars: HashMap<usize, ProgressBar> = HashMap::new();
    let subsets = create_subsets(&config);
    for (idx, subset) in subsets.into_iter().enumerate() {
        // Dont make empty workers
        if subset.is_empty() {
            continue;
        }
        let conf = config.clone();
        let worker_tx = tx.clone();
        let bar = pb_manager.add(ProgressBar::new(100));
        bar.set_style(bar_style(&BarColor::default()));
        bar.set_prefix(format!("Worker {idx}"));
        bars.insert(idx, bar);
        workers.push((
            idx,
            std::thread::spawn(move || process_subset(conf, worker_tx, idx, subset)),
        ));
    }
    // Drop the original sender so the loop below ends when the workers hang up
    drop(tx);

    while let Ok(status) = rx.recv() {
        if let Some(bar) = bars.get(&status.worker_id) {
            let msg = match status.color {
                BarColor::CYAN => "Sorting",
                BarColor::MAGENTA => "Writing",
                BarColor::RED => "Failed",
            };
            bar.set_style(bar_style(&status.color));
            bar.set_message(format!("{} run {}", msg, status.run_number));
            bar.set_position((status.progress * 100.0) as u64);
        }
    }

    for (idx, worker) in workers {
        match worker.join() {
            Ok(res) => match res {
                Ok(_) => {
                    if let Some(bar) = bars.get(&idx) {
                        bar.finish();
                    }
                    log::info!("Worker {idx} complete");
                }
                Err(e) => {
                    if let Some(bar) = bars.get(&idx) {
                        bar.set_style(bar_style(&BarColor::RED));
                        bar.abandon_with_message("Failed");
                    }
                    log::error!("Worker {idx} failed with error: {e}");
                }
            },
            Err(_) => log::error!("An error occured joining one of the workers!"),
        }
    }

    log::info!("Done.");
}
