pub mod blame;
pub mod checker;
pub mod cli;
pub mod config;
pub mod diagnostic;
pub mod fix;
pub mod formatter;
pub mod fs;
pub mod lines;
pub mod ratio;
pub mod score;
pub mod todos;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use blame::{AuthorAliases, Vcs, VcsBlame};
use checker::{CommandChecker, ExternalCommand};
use cli::{Args, Command, FixArgs, RatioArgs, ScoreArgs};
use config::{Config, compile_patterns, load_config};
use fix::{FixOptions, run_fixer};
use formatter::create_formatter;
use fs::{WalkOptions, discover_files, has_extension};
use score::CommandLinter;

/// Run one command. Returns the exit code: 0 = clean, 1 = problems found.
/// Errors before any file is processed surface as `Err`.
pub fn run(args: Args) -> Result<i32> {
    let config = load_config(args.config.as_deref())?;
    debug!(?config, "configuration loaded");

    let walk = args.command.walk();
    // --skip replaces the configured patterns rather than adding to them
    let skip = if walk.skip.is_empty() {
        &config.skip
    } else {
        &walk.skip
    };
    let walk_options = WalkOptions {
        skip: compile_patterns(skip)?,
        recursive: !walk.no_recursive,
    };

    match &args.command {
        Command::Fix(fix) => run_fix(fix, &config, &walk_options),
        Command::Score(score) => run_score(score, &config, &walk_options),
        Command::Todos(walk) => {
            let files = discover_files(&walk.paths, &walk_options, &todos::is_todo_candidate)?;
            let vcs = detect_vcs(&config)?;
            let aliases = AuthorAliases::new(config.authors.clone());
            let grouped = todos::collect_todos(&files, &VcsBlame::new(vcs, config.timeout()), &aliases);
            print!("{}", todos::render(&grouped));
            Ok(0)
        }
        Command::Ratio(ratio) => run_ratio(ratio, &config, &walk_options),
        Command::Lines(walk) => {
            let files = discover_files(&walk.paths, &walk_options, &|p: &Path| lines::rule_for(p).is_some())?;
            let issues = lines::check_files(&files)?;
            print!("{}", lines::render(&issues));
            Ok(if issues.is_empty() { 0 } else { 1 })
        }
    }
}

fn run_fix(args: &FixArgs, config: &Config, walk: &WalkOptions) -> Result<i32> {
    let files = discover_files(&args.walk.paths, walk, &has_extension(&config.extensions))?;
    debug!("{} files to fix", files.len());

    let timeout = match args.timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.timeout(),
    };
    let template = args.checker.as_deref().unwrap_or(&config.checker);
    let command = ExternalCommand::parse(template)
        .with_context(|| format!("invalid checker command {template:?}"))?
        .with_timeout(timeout);
    let checker = CommandChecker::new(command);

    let options = FixOptions {
        max_iterations: args.max_iterations.unwrap_or(config.max_iterations),
        dry_run: args.dry_run,
        parallel: args.parallel,
        fail_fast: args.fail_fast,
    };
    let report = run_fixer(&files, &checker, &options);
    create_formatter(&args.format).print(&report);
    Ok(report.exit_code())
}

fn run_score(args: &ScoreArgs, config: &Config, walk: &WalkOptions) -> Result<i32> {
    let files = discover_files(&args.walk.paths, walk, &has_extension(&config.extensions))?;

    let mut config = config.clone();
    if let Some(rcfile) = &args.rcfile {
        config.rcfile = Some(rcfile.clone());
    }
    let template = config.linter_command();
    let command = ExternalCommand::parse(&template)
        .with_context(|| format!("invalid linter command {template:?}"))?
        .with_timeout(config.timeout());

    if args.cmd {
        for file in &files {
            println!("{}", command.display_for(file));
        }
        return Ok(0);
    }

    let vcs = detect_vcs(&config)?;
    let aliases = AuthorAliases::new(config.authors.clone());
    let board = score::collect_scores(
        &files,
        &CommandLinter::new(command),
        &VcsBlame::new(vcs, config.timeout()),
        &aliases,
    );
    print!("{}", board.render(&args.authors));
    Ok(0)
}

fn run_ratio(args: &RatioArgs, config: &Config, walk: &WalkOptions) -> Result<i32> {
    let threshold = ratio::parse_threshold(&args.error_threshold)?;
    let files = discover_files(&args.walk.paths, walk, &has_extension(&config.extensions))?;

    let template = &config.ratio_checker;
    let command = ExternalCommand::parse(template)
        .with_context(|| format!("invalid ratio checker command {template:?}"))?
        .with_timeout(config.timeout());
    let report = ratio::check_ratios(&files, &CommandChecker::new(command), threshold);
    print!("{}", report.render());
    Ok(report.exit_code())
}

fn detect_vcs(config: &Config) -> Result<Vcs> {
    let vcs = Vcs::from_mode(config.blame, config.timeout())
        .context("blame needs a git or svn working copy")?;
    debug!(%vcs, "attributing lines");
    Ok(vcs)
}
