use std::io::Write;

use chrono::Local;
use env_logger::{Builder, Env};
use log::LevelFilter;

pub fn init_logger() {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Warn)
        .filter(Some("synk2ha"), LevelFilter::Debug)
        .filter(Some("sunsynk_ha_publish"), LevelFilter::Debug)
        .parse_env(Env::default())
        .init();
    set_verbose(false);
}

/// Verbose mode is re-read every cycle, so the level is switched on the
/// global gate rather than in the logger's filter.
pub fn set_verbose(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    log::set_max_level(level);
}
