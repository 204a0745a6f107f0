mod cli;
mod lines;
mod terminal;

use std::cell::RefCell;
use std::io::IsTerminal;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use mergeline_compute::{InlineMatcher, MainLoop, MatchCoordinator, Scheduler};
use mergeline_core::config::load_dotenv;
use mergeline_core::{EditOp, MatcherConfig};

use crate::cli::CliArgs;
use crate::lines::diff_lines;
use crate::terminal::Terminal;

type InlineResults = Rc<RefCell<Vec<Option<Rc<[EditOp]>>>>>;

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let args = CliArgs::parse();

    let mut config = MatcherConfig::load(args.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(workers) = args.workers {
        config.worker_threads = workers;
    }
    if let Some(policy) = args.policy {
        config.scheduler_policy = policy;
    }
    config.validate().context("invalid configuration")?;
    config.log_summary();

    let left = std::fs::read_to_string(&args.left)
        .with_context(|| format!("failed to read {}", args.left.display()))?;
    let right = std::fs::read_to_string(&args.right)
        .with_context(|| format!("failed to read {}", args.right.display()))?;

    let diff = diff_lines(&left, &right);
    info!(
        replaced = diff.replaced.len(),
        deleted = diff.deleted,
        inserted = diff.inserted,
        "Line diff computed"
    );

    // The inline highlighter gets its own scheduler nested under the loop's root.
    let main_loop = MainLoop::new(Scheduler::named("root", config.scheduler_policy));
    let inline = Scheduler::named("inline-highlight", config.scheduler_policy);
    main_loop.scheduler().add_scheduler(&inline);

    let coordinator = MatchCoordinator::new(
        inline.clone(),
        &*main_loop,
        Arc::new(InlineMatcher::from_config(&config)),
        config.clone(),
    );

    let results: InlineResults = Rc::new(RefCell::new(vec![None; diff.replaced.len()]));
    let limit = config.max_input_chars;
    for (index, line) in diff.replaced.iter().enumerate() {
        // A refused job is never answered; oversized lines print without highlights.
        if limit > 0 && (line.left.chars().count() > limit || line.right.chars().count() > limit) {
            info!(line = line.left_no + 1, limit, "Skipping inline match for long line");
            continue;
        }
        let slot = Rc::clone(&results);
        coordinator
            .match_texts(&line.left, &line.right, move |edits| {
                slot.borrow_mut()[index] = Some(edits);
            })
            .context("failed to submit inline match")?;
    }

    let ticks = main_loop.run_until_idle(args.max_ticks);
    if main_loop.has_pending() {
        warn!(ticks, "Stopped before every inline match was delivered");
    } else {
        info!(ticks, "All inline matches delivered");
    }

    let terminal = Terminal::new(std::io::stdout().is_terminal());
    terminal.print_header(&args.left.display().to_string(), &args.right.display().to_string())?;
    let results = results.borrow();
    for (line, edits) in diff.replaced.iter().zip(results.iter()) {
        terminal.print_pair(line, edits.as_deref())?;
    }
    let unmatched = results.iter().filter(|r| r.is_none()).count();
    terminal.print_summary(&diff, unmatched)?;

    let size_hint = match config.cache_size_hint {
        0 => diff.replaced.len(),
        hint => hint,
    };
    coordinator.clean(size_hint);

    if args.stats {
        let metrics = coordinator.metrics();
        println!(
            "{}",
            serde_json::to_string_pretty(&metrics).context("failed to serialize metrics")?
        );
    }

    coordinator.stop();
    main_loop.scheduler().remove_scheduler(&inline);
    Ok(())
}
