use clap::{Parser, Subcommand};

use common::telemetry::init_telemetry;

use router::command::choose::{ChooseArgs, choose};
use router::command::files::{ReadArgs, StatArgs, WriteArgs, read, stat, write};
use router::command::resolve::{LocateArgs, ResolveArgs, locate, resolve};
use router::command::watch::{WatchArgs, watch};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
enum Cmd {
    /// Print the public URL of a link
    Resolve(ResolveArgs),
    /// Print the link owning a public URL
    Locate(LocateArgs),
    /// Print the server a write to a cluster would go to
    Choose(ChooseArgs),
    /// Print file metadata
    Stat(StatArgs),
    /// Download a file
    Read(ReadArgs),
    /// Upload a file
    Write(WriteArgs),
    /// Keep refreshing the registry and log its contents
    Watch(WatchArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry("router");

    let args = Args::parse();

    match args.cmd {
        Cmd::Resolve(resolve_args) => {
            resolve(resolve_args).await?;
        }
        Cmd::Locate(locate_args) => {
            locate(locate_args).await?;
        }
        Cmd::Choose(choose_args) => {
            choose(choose_args).await?;
        }
        Cmd::Stat(stat_args) => {
            stat(stat_args).await?;
        }
        Cmd::Read(read_args) => {
            read(read_args).await?;
        }
        Cmd::Write(write_args) => {
            write(write_args).await?;
        }
        Cmd::Watch(watch_args) => {
            watch(watch_args).await?;
        }
    }

    Ok(())
}
