use clap::Parser;

use crate::command::common::{DirectoryArgs, connect};

#[derive(Parser, Debug, Clone)]
pub struct ChooseArgs {
    #[command(flatten)]
    directory: DirectoryArgs,

    /// Cluster to pick a write target from
    cluster: String,
}

/// Prints the server a write to `cluster` would go to.
pub async fn choose(args: ChooseArgs) -> anyhow::Result<()> {
    let (router, refresher) = connect(&args.directory, &[&args.cluster]).await?;

    let res = router.resolve_server_for_write(&args.cluster);
    refresher.shutdown().await?;

    println!("{}", serde_json::to_string_pretty(&res?)?);
    Ok(())
}
