//! Command dispatch for `rtmp-streamer` and `rtmp-client`

use std::io;

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use tracing::{debug, instrument};

use crate::application::services::{
    stdin_controls, PlaybackOutcome, ViewerEnd, ViewerEvent,
};
use crate::cli::args::{ClientCli, CommonArgs, StreamerCli};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::Settings;
use crate::exitcode;
use crate::infrastructure::di::ServiceContainer;

/// Write completions for `C` to stdout.
pub fn print_completions<C: CommandFactory>(shell: Shell) {
    let mut cmd = C::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

/// Handle flags that print something and exit before any work is done.
///
/// Returns `true` if the program should exit now.
fn handle_info_flags(common: &CommonArgs, settings: &Settings) -> CliResult<bool> {
    if common.config_template {
        output::info(&Settings::template());
        return Ok(true);
    }
    if common.show_config {
        output::info(&settings.to_toml()?);
        return Ok(true);
    }
    Ok(false)
}

#[instrument(skip_all)]
pub fn run_streamer(cli: &StreamerCli) -> CliResult<i32> {
    let mut settings = Settings::load(cli.common.config.as_deref())?;
    cli.apply(&mut settings.streamer);
    debug!("streamer settings: {:?}", settings.streamer);

    if handle_info_flags(&cli.common, &settings)? {
        return Ok(exitcode::OK);
    }

    let container = ServiceContainer::new(settings);
    let service = container.streamer_service();

    if cli.common.dry_run {
        let plan = service.dry_run_plan()?;
        output::header("primary:");
        output::info(&plan.primary_line());
        if let Some(line) = plan.fallback_line() {
            output::header("fallback:");
            output::info(&line);
        }
        return Ok(exitcode::OK);
    }

    container.install_interrupt_handler("Stopping stream...")?;
    output::action("Starting", "ffmpeg (hardware encoder if available)...");

    let outcome = service.run_with(&mut |_| {
        output::warning("Falling back to software encoder (libx264)...");
    })?;
    if outcome.exit_code != exitcode::OK && !outcome.interrupted {
        output::warning(&format!("ffmpeg exited with code {}", outcome.exit_code));
    } else if outcome.fallback_used && outcome.exit_code == exitcode::OK {
        output::success("stream finished (software encoder)");
    }
    Ok(outcome.exit_code)
}

#[instrument(skip_all)]
pub fn run_client(cli: &ClientCli) -> CliResult<i32> {
    let mut settings = Settings::load(cli.common.config.as_deref())?;
    cli.apply(&mut settings.client);
    debug!("client settings: {:?}", settings.client);

    if handle_info_flags(&cli.common, &settings)? {
        return Ok(exitcode::OK);
    }
    if settings.client.queue_size == 0 {
        return Err(CliError::Usage("--queue-size must be at least 1".into()));
    }

    let fallback_only = settings.client.fallback_only;
    let container = ServiceContainer::new(settings);
    let service = container.player_service();

    if cli.common.dry_run {
        let (player, decoder) = service.dry_run_lines()?;
        if !fallback_only {
            output::header("player:");
            output::info(&player);
        }
        output::header("fallback decoder:");
        output::info(&decoder);
        return Ok(exitcode::OK);
    }

    container.install_interrupt_handler("Stopping...")?;
    if !fallback_only {
        output::action("Launching", "ffplay... (close the window to exit)");
    }

    let controls = || {
        if !fallback_only {
            output::warning("ffplay not available or failed; falling back to pipe viewer...");
        }
        output::info("Press 's' + Enter to toggle saving, 'q' + Enter to quit.");
        stdin_controls()
    };
    let outcome = service.run(controls, &mut print_viewer_event)?;

    if let PlaybackOutcome::Viewer(report) = &outcome {
        if report.ended_by == ViewerEnd::StreamEnded {
            output::warning("Frame read failed; exiting.");
        }
        output::detail(&format!("{} frames received", report.frames));
    }
    Ok(outcome.exit_code())
}

fn print_viewer_event(event: ViewerEvent) {
    match event {
        ViewerEvent::Status {
            frames,
            fps,
            saving,
        } => output::detail(&format!(
            "{frames} frames, {fps:.1} fps, saving {}",
            if saving { "on" } else { "off" }
        )),
        ViewerEvent::SavingStarted(dir) => output::action("Saving", &dir.display()),
        ViewerEvent::SavingStopped(report) => {
            output::success(&format!(
                "saved {} frames to {}",
                report.written,
                report.session_dir.display()
            ));
            if report.dropped > 0 || report.write_errors > 0 {
                output::detail(&format!(
                    "{} dropped (queue full), {} failed writes",
                    report.dropped, report.write_errors
                ));
            }
        }
        ViewerEvent::SavingFailed(msg) => output::warning(&format!("saving disabled: {msg}")),
    }
}
