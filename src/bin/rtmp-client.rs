use clap::Parser;

use rtmpcam::cli::commands::{print_completions, run_client};
use rtmpcam::cli::logging::setup_logging;
use rtmpcam::cli::output;
use rtmpcam::cli::ClientCli;

fn main() {
    let cli = ClientCli::parse();

    if let Some(shell) = cli.common.completions {
        eprintln!("Generating completion file for {shell:?}...");
        print_completions::<ClientCli>(shell);
        return;
    }

    setup_logging(cli.common.verbose);

    match run_client(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::error(&e);
            if let Some(hint) = e.hint() {
                output::hint(&hint);
            }
            std::process::exit(e.exit_code());
        }
    }
}
