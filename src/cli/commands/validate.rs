//! Validate command implementation

use anyhow::Context;

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{load_config, validate_config, RunSpec, ValidateArgs};

/// Format loop configuration as a string
pub fn format_loop_info(spec: &RunSpec) -> String {
    let mut lines = vec![
        format!("  Epochs: {}", spec.max_epoch),
        format!("  Batches per epoch: {}", spec.batches.len()),
        format!("  Decay: {}", spec.decay),
    ];
    if spec.floor != 0.0 {
        lines.push(format!("  Floor: {}", spec.floor));
    }
    if let Some(size) = spec.batch_size {
        lines.push(format!("  Batch size: {size}"));
    }
    lines.join("\n")
}

/// Format reducer configuration as a string
pub fn format_reducer_info(spec: &RunSpec) -> Option<String> {
    if spec.reducers.is_empty() {
        return None;
    }
    let mut lines = vec!["  Reducers:".to_string()];
    for reducer in &spec.reducers {
        lines.push(format!("    {} = {}({})", reducer.name, reducer.kind, reducer.value));
    }
    Some(lines.join("\n"))
}

/// Format early stopping configuration as a string
pub fn format_early_stopping_info(spec: &RunSpec) -> Option<String> {
    spec.early_stopping.as_ref().map(|es| {
        format!(
            "  Early stopping:\n    Monitor: {} ({:?})\n    Patience: {}\n    Eps: {}",
            es.monitor, es.mode, es.patience, es.eps
        )
    })
}

/// Format checkpoint configuration as a string
pub fn format_checkpoint_info(spec: &RunSpec) -> Option<String> {
    spec.checkpoint.as_ref().map(|ckpt| {
        let mut lines = vec![
            "  Checkpoints:".to_string(),
            format!("    Dir: {}", ckpt.dir.display()),
            format!("    Keep: {}", ckpt.max_saved),
        ];
        if let Some(monitor) = &ckpt.monitor {
            lines.push(format!("    Monitor: {monitor} ({:?})", ckpt.mode));
        }
        lines.join("\n")
    })
}

/// Print detailed configuration summary
pub fn print_detailed_summary(spec: &RunSpec) {
    println!();
    println!("Configuration Summary:");
    println!("{}", format_loop_info(spec));

    let sections = [
        format_reducer_info(spec),
        format_early_stopping_info(spec),
        format_checkpoint_info(spec),
    ];
    for section in sections.into_iter().flatten() {
        println!();
        println!("{section}");
    }
}

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> anyhow::Result<()> {
    log(level, LogLevel::Normal, &format!("Validating config: {}", args.config.display()));

    let spec = load_config(&args.config).context("Config error")?;
    validate_config(&spec).context("Validation failed")?;

    log(level, LogLevel::Normal, "Configuration is valid");

    if args.detailed && level != LogLevel::Quiet {
        print_detailed_summary(&spec);
    }

    Ok(())
}
