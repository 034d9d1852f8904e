use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod cmd_cat;
mod cmd_doctor;
mod cmd_format;
mod cmd_ls;
mod cmd_put;
mod cmd_rdb;
mod cmd_rm;
mod cmd_stat;
mod util;

fn init_logger() {
    // RUST_LOG overrides; default info.
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli::Cli { dev, cmd } = cli::Cli::parse();
    match cmd {
        cli::Cmd::Format => cmd_format::exec(&dev),
        cli::Cmd::Ls { json } => cmd_ls::exec(&dev, json),
        cli::Cmd::Cat { name, out } => cmd_cat::exec(&dev, &name, out),
        cli::Cmd::Put { name, value, size } => cmd_put::exec(&dev, &name, &value, size),
        cli::Cmd::Rm { name } => cmd_rm::exec(&dev, &name),
        cli::Cmd::Stat { json } => cmd_stat::exec(&dev, json),
        cli::Cmd::Doctor { json } => cmd_doctor::exec(&dev, json),
        cli::Cmd::RdbDump { id, json } => cmd_rdb::exec_dump(&dev, id, json),
        cli::Cmd::RdbPut {
            id,
            key,
            value,
            update,
        } => cmd_rdb::exec_put(&dev, id, &key, &value, update),
        cli::Cmd::RdbDel { id, key } => cmd_rdb::exec_del(&dev, id, &key),
        cli::Cmd::RdbCompact { id } => cmd_rdb::exec_compact(&dev, id),
    }
}
