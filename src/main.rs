use clap::Parser;
use log::{info, warn};
use snafu::ErrorCompat;

mod args;
mod survey;

use crate::survey::{run_survey, RunOptions};

fn main() {
    let args = args::Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    info!("args: {:?}", args);

    let options = RunOptions {
        input: args.input.clone(),
        input_type: args.input_type.clone(),
        excel_worksheet_name: args.excel_worksheet_name.clone(),
        out: args.out.clone(),
        reference: args.reference.clone(),
    };

    if let Err(e) = run_survey(&args.config, &options) {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured: {}", e);
        for cause in e.iter_chain().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        std::process::exit(1);
    }
}
