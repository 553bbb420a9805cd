use clap::Parser;
use log::info;

mod args;
mod xtab;

use crate::args::Args;

fn main() {
    let args = Args::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
    info!("args: {:?}", args);

    if let Err(e) = xtab::run_survey(&args) {
        xtab::report_error(&e);
        std::process::exit(1);
    }
}
