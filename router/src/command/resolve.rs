use clap::Parser;

use crate::command::common::{DirectoryArgs, connect};
use crate::core::link::Link;

#[derive(Parser, Debug, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    directory: DirectoryArgs,

    /// Link of the form cluster:server/path
    link: String,
}

/// Prints the public URL of a link.
pub async fn resolve(args: ResolveArgs) -> anyhow::Result<()> {
    let link = Link::passthrough(args.link);
    let (router, refresher) = connect(&args.directory, &[link.cluster_id()]).await?;

    let res = router.resolve_url(&link);
    refresher.shutdown().await?;

    println!("{}", res?);
    Ok(())
}

#[derive(Parser, Debug, Clone)]
pub struct LocateArgs {
    #[command(flatten)]
    directory: DirectoryArgs,

    /// Public URL of a stored file
    url: String,
}

/// Prints the link owning a public URL.
pub async fn locate(args: LocateArgs) -> anyhow::Result<()> {
    let (router, refresher) = connect(&args.directory, &[]).await?;

    let link = router.link_from_url(&args.url);
    refresher.shutdown().await?;

    match link {
        Some(link) => println!("{}", link),
        None => anyhow::bail!("no registered server owns {}", args.url),
    }
    Ok(())
}
