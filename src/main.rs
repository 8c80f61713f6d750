use clap::Parser;
use env_logger::Env;
use log::error;

use sign_stream_lib::cli::{Opts, SubCommandExtend};
use sign_stream_lib::model::AppConfig;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();
    let config = AppConfig::load_or_default(&opts.config);
    config.display();

    if let Err(e) = opts.subcmd.run(&config) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
