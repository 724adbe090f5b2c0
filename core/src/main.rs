//! E2E Bootstrap CLI
//!
//! Checks out the code under test and runs the E2E runner against it.

use clap::Parser;

use e2e_bootstrap::{logging, Bootstrap, BootstrapConfig, SystemRunner};

/// Run E2E tests for the TfJob CRD.
///
/// Configuration comes from the environment: GOPATH, REPO_OWNER, REPO_NAME,
/// PULL_PULL_SHA and PULL_BASE_SHA.
#[derive(Parser, Debug)]
#[command(name = "e2e-bootstrap", version)]
struct Cli {}

fn main() {
    let _cli = Cli::parse();
    logging::init();
    logging::log_environment();

    let result = BootstrapConfig::from_env()
        .and_then(|config| Bootstrap::new(config, SystemRunner::new()).run());

    match result {
        Ok(checkout) => {
            tracing::info!(
                src_dir = ?checkout.source_dir,
                sha = %checkout.revision,
                "E2E runner finished"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "bootstrap failed");
            eprintln!("Bootstrap failed: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}
