mod config;
mod logging;
mod reqwest_wrapper;

use log::{error, info};
use reqwest_wrapper::ReqwestWrapper;
use synk2ha::cycle::Bridge;
use synk2ha::scratch::SharedScratch;
use synk2ha::sleeper::ThreadSleeper;

fn main() {
    logging::init_logger();
    info!("Running revision: {}", env!("GIT_HASH"));
    if std::env::args().len() > 1 {
        error!("Arguments passed. Tool is configured by config.toml or environment variables");
    }

    let mut config = config::load();
    logging::set_verbose(config.verbose());

    // scratch files must not outlive the process, wherever it is interrupted
    let scratch = SharedScratch::new(config.scratch_dir());
    let handler_scratch = scratch.clone();
    ctrlc::set_handler(move || {
        info!("shutting down, removing scratch files");
        handler_scratch.purge();
        std::process::exit(0);
    })
    .expect("could not install shutdown handler");

    info!("publishing to Home Assistant at {}", config.ha_base_url());
    let mut bridge = Bridge::<ReqwestWrapper, ThreadSleeper>::new(&config, ThreadSleeper);

    loop {
        let report = bridge.run_cycle(&config);
        info!("cycle outcome: {:?}", report.outcome);
        bridge.wait(&report);

        config = config::load();
        logging::set_verbose(config.verbose());
        scratch.follow(config.scratch_dir());
    }
}
