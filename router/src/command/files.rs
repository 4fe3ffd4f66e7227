use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use common::schemas::Collection;

use crate::command::common::{DirectoryArgs, connect};
use crate::core::link::Link;

#[derive(Parser, Debug, Clone)]
pub struct StatArgs {
    #[command(flatten)]
    directory: DirectoryArgs,

    /// Link of the form cluster:server/path
    link: String,
}

pub async fn stat(args: StatArgs) -> anyhow::Result<()> {
    let link = Link::passthrough(args.link);
    let (router, refresher) = connect(&args.directory, &[link.cluster_id()]).await?;

    let res = router.stat(&link).await;
    refresher.shutdown().await?;

    println!("{}", serde_json::to_string_pretty(&res?)?);
    Ok(())
}

#[derive(Parser, Debug, Clone)]
pub struct ReadArgs {
    #[command(flatten)]
    directory: DirectoryArgs,

    /// Link of the form cluster:server/path
    link: String,

    /// Write the content here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

pub async fn read(args: ReadArgs) -> anyhow::Result<()> {
    let link = Link::passthrough(args.link);
    let (router, refresher) = connect(&args.directory, &[link.cluster_id()]).await?;

    let res = router.read(&link).await;
    refresher.shutdown().await?;
    let bytes = res?;

    match args.out {
        Some(path) => {
            tokio::fs::write(&path, &bytes).await?;
            info!("wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => {
            use tokio::io::AsyncWriteExt;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&bytes).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

#[derive(Parser, Debug, Clone)]
pub struct WriteArgs {
    #[command(flatten)]
    directory: DirectoryArgs,

    /// Cluster to store the file in
    cluster: String,

    /// Local file to upload
    file: PathBuf,

    /// Pin the upload to this server instead of the least-loaded one
    #[arg(long)]
    server: Option<String>,

    /// Storage collection (image, video, epub, txt, pdf, bin, office, zip)
    #[arg(long, default_value = "bin")]
    collection: Collection,
}

pub async fn write(args: WriteArgs) -> anyhow::Result<()> {
    let (router, refresher) = connect(&args.directory, &[&args.cluster]).await?;

    let file_name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("not a file: {}", args.file.display()))?;
    let reader = tokio::fs::File::open(&args.file).await?;

    let res = match &args.server {
        Some(server_id) => {
            router
                .write_to(reader, &args.cluster, server_id, &file_name, args.collection)
                .await
        }
        None => {
            router
                .write(reader, &args.cluster, &file_name, args.collection)
                .await
        }
    };
    refresher.shutdown().await?;

    let link = res?;
    println!("{}", link);
    Ok(())
}
