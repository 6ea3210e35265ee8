//! Command handlers

use crate::cli::{Cli, Commands};
use crate::output::{output_history, output_record, output_review, output_stats};
use chrono::Utc;
use dimscope_app::config::Config;
use dimscope_app::export::{export_to_excel, ExportReport};
use dimscope_app::repository::{open_detector, open_record_service, open_store};
use dimscope_app::scanner::{load_image, scan_directory};
use dimscope_app::{CaptureOutcome, MeasurementOrchestrator, OrchestratorError, OrchestratorOptions};
use dimscope_detect::DetectionClient;
use dimscope_domain::repository::MeasurementRepository;
use dimscope_domain::service::{ContainFit, Size};
use dimscope_server::{run_server, ApiState};
use dimscope_types::{Error, MeasurementId, MeasurementMethod, OutputFormat, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use serde_json::json;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Leave SaveFailed so the next capture can start
fn settle_failed_save(orchestrator: &MeasurementOrchestrator) -> bool {
    match orchestrator.acknowledge() {
        Ok(()) => true,
        Err(e) => {
            warn!("Could not reset after failed save: {}", e);
            false
        }
    }
}

/// Execute CLI command
pub fn execute(cli: Cli) -> Result<()> {
    // Load config
    let mut config = Config::load()?;

    // Override from CLI args
    if let Some(ref url) = cli.detector_url {
        config.detector_url = url.clone();
    }
    let output_format = cli.format.unwrap_or(config.output_format);

    match &cli.command {
        Commands::Measure {
            image,
            camera,
            save,
            select,
            container,
        } => {
            let method = if *camera {
                MeasurementMethod::Camera
            } else {
                MeasurementMethod::Upload
            };
            cmd_measure(
                &config,
                resolve_owner(&cli, &config)?,
                image.clone(),
                method,
                *save,
                *select,
                container.clone(),
                output_format,
            )
        }

        Commands::Batch { folder, save } => cmd_batch(
            &config,
            resolve_owner(&cli, &config)?,
            folder.clone(),
            *save,
            output_format,
        ),

        Commands::Health => cmd_health(&config, output_format),

        Commands::History { limit } => {
            cmd_history(&config, &resolve_owner(&cli, &config)?, *limit, output_format)
        }

        Commands::Show { id } => cmd_show(&config, &resolve_owner(&cli, &config)?, *id, output_format),

        Commands::Delete { id } => cmd_delete(&config, &resolve_owner(&cli, &config)?, *id),

        Commands::Stats { distribution } => cmd_stats(
            &config,
            &resolve_owner(&cli, &config)?,
            *distribution,
            output_format,
        ),

        Commands::Export { output } => {
            cmd_export(&config, &resolve_owner(&cli, &config)?, output.clone())
        }

        Commands::Serve { host, port } => cmd_serve(&config, host.clone(), *port),

        Commands::Config {
            show,
            set_detector_url,
            set_owner,
            set_store_dir,
            set_save_images,
            set_output,
            set_retries,
            set_measure_timeout,
            set_unit,
            reset,
        } => cmd_config(ConfigUpdate {
            show: *show,
            detector_url: set_detector_url.clone(),
            owner: set_owner.clone(),
            store_dir: set_store_dir.clone(),
            save_images: *set_save_images,
            output: *set_output,
            retries: *set_retries,
            measure_timeout: *set_measure_timeout,
            unit: set_unit.clone(),
            reset: *reset,
        }),
    }
}

/// --owner, else the configured default
fn resolve_owner(cli: &Cli, config: &Config) -> Result<String> {
    cli.owner
        .clone()
        .or_else(|| config.default_owner.clone())
        .map(|owner| owner.trim().to_string())
        .filter(|owner| !owner.is_empty())
        .ok_or_else(|| {
            Error::Other(
                "No user id. Pass --owner or run: dimscope config --set-owner <id>".to_string(),
            )
        })
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Runtime::new()?)
}

fn orchestration_error(err: OrchestratorError) -> Error {
    match err {
        OrchestratorError::Storage(msg) => Error::StorageUnavailable(msg),
        other => Error::Other(other.to_string()),
    }
}

/// Await `fut` behind a spinner when printing tables
async fn with_spinner<F: Future>(output_format: OutputFormat, message: String, fut: F) -> F::Output {
    if output_format != OutputFormat::Table {
        return fut.await;
    }

    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg} [{elapsed}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));

    let output = fut.await;
    pb.finish_and_clear();
    output
}

fn open_orchestrator(config: &Config, owner_id: String) -> Result<MeasurementOrchestrator> {
    let detector: Arc<dyn DetectionClient> = Arc::new(open_detector(config)?);
    let repository: Arc<dyn MeasurementRepository> = Arc::new(open_store(config)?);
    Ok(MeasurementOrchestrator::new(owner_id, detector, repository).with_options(
        OrchestratorOptions {
            save_images: config.save_images,
        },
    ))
}

#[allow(clippy::too_many_arguments)]
fn cmd_measure(
    config: &Config,
    owner_id: String,
    image: PathBuf,
    method: MeasurementMethod,
    save: bool,
    select: Option<usize>,
    container: Option<String>,
    output_format: OutputFormat,
) -> Result<()> {
    let payload = load_image(&image)?;
    let container = container
        .map(|raw| {
            Size::parse(&raw).ok_or_else(|| {
                Error::Other(format!(
                    "Invalid --container '{}': expected WxH such as 400x300",
                    raw
                ))
            })
        })
        .transpose()?;

    if select.is_some() && !save {
        eprintln!("Note: --select has no effect without --save");
    }

    let orchestrator = open_orchestrator(config, owner_id)?;
    let rt = runtime()?;

    rt.block_on(async {
        let outcome = with_spinner(
            output_format,
            format!("Measuring {}", image.display()),
            orchestrator.capture(payload, method),
        )
        .await
        .map_err(orchestration_error)?;

        let review = match outcome {
            CaptureOutcome::Review(review) => review,
            CaptureOutcome::Failed { message } => {
                orchestrator.acknowledge().map_err(orchestration_error)?;
                return Err(Error::Other(format!("Detection failed: {}", message)));
            }
        };

        let overlay = match container {
            Some(container) => {
                let (width, height) = review.image.dimensions()?;
                let fit = ContainFit::new(Size::new(width as f64, height as f64), container);
                Some(fit.map_all(&review.results))
            }
            None => None,
        };
        output_review(output_format, &review, overlay.as_deref())?;

        if !save {
            orchestrator.discard().map_err(orchestration_error)?;
            return Ok(());
        }

        let saved = orchestrator.save(select).await.map_err(orchestration_error)?;
        eprintln!(
            "Saved \"{}\" ({}) as measurement #{}",
            saved.object_name, saved.dimensions, saved.id
        );
        Ok(())
    })
}

fn cmd_batch(
    config: &Config,
    owner_id: String,
    folder: PathBuf,
    save: bool,
    output_format: OutputFormat,
) -> Result<()> {
    let images = scan_directory(&folder)?;
    if images.is_empty() {
        println!("No images found in {}", folder.display());
        return Ok(());
    }

    let orchestrator = open_orchestrator(config, owner_id)?;
    let rt = runtime()?;

    let pb = ProgressBar::new(images.len() as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    if output_format != OutputFormat::Table {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let mut rows = Vec::new();
    let mut success_count = 0;
    let mut fail_count = 0;

    for path in &images {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("?")
            .to_string();
        pb.set_message(name.clone());

        let result: Result<serde_json::Value> = rt.block_on(async {
            let payload = load_image(path)?;
            match orchestrator
                .capture(payload, MeasurementMethod::Upload)
                .await
                .map_err(orchestration_error)?
            {
                CaptureOutcome::Review(review) => {
                    let saved_id = if save {
                        match orchestrator.save(None).await {
                            Ok(saved) => Some(saved.id),
                            Err(e) => {
                                settle_failed_save(&orchestrator);
                                return Err(orchestration_error(e));
                            }
                        }
                    } else {
                        orchestrator.discard().map_err(orchestration_error)?;
                        None
                    };
                    Ok(json!({
                        "file": name,
                        "success": true,
                        "message": review.message,
                        "measurements": review.results,
                        "savedId": saved_id,
                    }))
                }
                CaptureOutcome::Failed { message } => {
                    orchestrator.acknowledge().map_err(orchestration_error)?;
                    Ok(json!({ "file": name, "success": false, "message": message }))
                }
            }
        });

        let row = result.unwrap_or_else(|e| json!({ "file": name, "success": false, "message": e.to_string() }));
        if row["success"].as_bool().unwrap_or(false) {
            success_count += 1;
        } else {
            fail_count += 1;
        }

        if output_format == OutputFormat::Table {
            let summary = match row["measurements"].get(0) {
                Some(first) => format!(
                    "{} ({})",
                    first["objectName"].as_str().unwrap_or("?"),
                    first["dimensions"].as_str().unwrap_or("?")
                ),
                None => format!("✗ {}", row["message"].as_str().unwrap_or("failed")),
            };
            pb.println(format!("{:<40} {}", name, summary));
        }
        rows.push(row);
        pb.inc(1);
    }
    pb.finish_and_clear();

    if output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!();
        println!(
            "Processed {} images: {} measured, {} failed",
            images.len(),
            success_count,
            fail_count
        );
    }

    Ok(())
}

fn cmd_health(config: &Config, output_format: OutputFormat) -> Result<()> {
    let detector = open_detector(config)?;
    let rt = runtime()?;
    let healthy = rt.block_on(detector.check_health());

    if output_format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "url": config.detector_url, "healthy": healthy }))?
        );
    } else if healthy {
        println!("✓ Detection service is ready at {}", config.detector_url);
    } else {
        println!("✗ Detection service is not ready at {}", config.detector_url);
    }

    if healthy {
        Ok(())
    } else {
        Err(Error::DetectionUnavailable(config.detector_url.clone()))
    }
}

fn cmd_history(config: &Config, owner_id: &str, limit: usize, output_format: OutputFormat) -> Result<()> {
    let records = open_record_service(config)?.list(owner_id)?;
    output_history(output_format, owner_id, &records, limit)
}

fn cmd_show(config: &Config, owner_id: &str, id: MeasurementId, output_format: OutputFormat) -> Result<()> {
    let record = open_record_service(config)?.get_owned(owner_id, id)?;
    output_record(output_format, &record)
}

fn cmd_delete(config: &Config, owner_id: &str, id: MeasurementId) -> Result<()> {
    open_record_service(config)?.delete_owned(owner_id, id)?;
    println!("Deleted measurement #{}", id);
    Ok(())
}

fn cmd_stats(
    config: &Config,
    owner_id: &str,
    with_distribution: bool,
    output_format: OutputFormat,
) -> Result<()> {
    let records = open_record_service(config)?;
    let stats = records.stats(owner_id, Utc::now())?;
    let distribution = if with_distribution {
        Some(records.distribution(owner_id)?)
    } else {
        None
    };
    output_stats(output_format, &stats, distribution.as_ref())
}

fn cmd_export(config: &Config, owner_id: &str, output: PathBuf) -> Result<()> {
    let records = open_record_service(config)?;
    let list = records.list(owner_id)?;
    let stats = records.stats(owner_id, Utc::now())?;
    let distribution = records.distribution(owner_id)?;

    let report = ExportReport {
        owner_id,
        records: &list,
        stats: &stats,
        distribution: &distribution,
    };
    export_to_excel(&report, &output)?;

    println!("Exported {} measurements to {}", list.len(), output.display());
    Ok(())
}

fn cmd_serve(config: &Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let state = ApiState::new(open_record_service(config)?, config.server.owner_header.clone());

    println!("Serving measurements on http://{}:{}", host, port);
    actix_web::rt::System::new().block_on(run_server(state, &host, port))?;
    Ok(())
}

/// Requested config changes
struct ConfigUpdate {
    show: bool,
    detector_url: Option<String>,
    owner: Option<String>,
    store_dir: Option<PathBuf>,
    save_images: Option<bool>,
    output: Option<OutputFormat>,
    retries: Option<u32>,
    measure_timeout: Option<u64>,
    unit: Option<String>,
    reset: bool,
}

fn cmd_config(update: ConfigUpdate) -> Result<()> {
    if update.reset {
        let config = Config::default();
        config.save()?;
        println!("Configuration reset to defaults");
        println!("\n{}", config);
        return Ok(());
    }

    // env overrides must not end up in the saved file
    let mut config = Config::load_from(&Config::config_path()?)?;
    let mut modified = false;

    if let Some(url) = update.detector_url {
        config.detector_url = url;
        modified = true;
    }

    if let Some(owner) = update.owner {
        config.default_owner = Some(owner);
        modified = true;
    }

    if let Some(dir) = update.store_dir {
        config.store_dir = Some(dir);
        modified = true;
    }

    if let Some(save_images) = update.save_images {
        config.save_images = save_images;
        modified = true;
    }

    if let Some(output_format) = update.output {
        config.output_format = output_format;
        modified = true;
    }

    if let Some(retries) = update.retries {
        config.retry_count = retries;
        modified = true;
    }

    if let Some(secs) = update.measure_timeout {
        config.measure_timeout_secs = if secs == 0 { None } else { Some(secs) };
        modified = true;
    }

    if let Some(unit) = update.unit {
        config.unit_suffix = unit;
        modified = true;
    }

    if modified {
        config.save()?;
        println!("Configuration updated");
    }

    if update.show || !modified {
        println!("{}", config);
    }

    Ok(())
}
