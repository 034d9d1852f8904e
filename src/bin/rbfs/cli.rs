use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::util::parse_num;

/// Inspect and edit flash images holding a rebblestore filesystem
#[derive(Parser, Debug)]
#[command(name = "rbfs", version, about = "rebblestore flash image tool")]
pub struct Cli {
    #[command(flatten)]
    pub dev: DeviceArgs,
    #[command(subcommand)]
    pub cmd: Cmd,
}

/// Image file and geometry. Unset geometry comes from RBFS_* env, then defaults.
#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Flash image (addressed from 0, so a full-part dump works as is)
    #[arg(long)]
    pub image: PathBuf,
    #[arg(long, value_parser = parse_num)]
    pub region_start: Option<u32>,
    #[arg(long, value_parser = parse_num)]
    pub page_size: Option<u32>,
    #[arg(long, value_parser = parse_num)]
    pub page_count: Option<u32>,
    #[arg(long, value_parser = parse_num)]
    pub erase_size: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Erase the region and write fresh page headers (creates the image if missing)
    Format,
    /// List files
    Ls {
        #[arg(long)]
        json: bool,
    },
    /// Print a file (or write it to --out)
    Cat {
        name: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Store a file, atomically replacing one of the same name.
    /// Value: literal, hex:.., @path or - for stdin
    Put {
        name: String,
        value: String,
        /// Allocate this many bytes instead of the value length
        #[arg(long)]
        size: Option<usize>,
    },
    /// Delete a file
    Rm { name: String },
    /// Page usage and I/O counters
    Stat {
        #[arg(long)]
        json: bool,
    },
    /// Verify page, link and file header CRCs
    Doctor {
        #[arg(long)]
        json: bool,
    },
    /// List the records of a database
    RdbDump {
        #[arg(value_parser = parse_num)]
        id: u32,
        #[arg(long)]
        json: bool,
    },
    /// Insert a record (fails on an existing key unless --update)
    RdbPut {
        #[arg(value_parser = parse_num)]
        id: u32,
        key: String,
        value: String,
        #[arg(long)]
        update: bool,
    },
    /// Delete the record under a key
    RdbDel {
        #[arg(value_parser = parse_num)]
        id: u32,
        key: String,
    },
    /// Compact a database into a fresh file
    RdbCompact {
        #[arg(value_parser = parse_num)]
        id: u32,
    },
}
