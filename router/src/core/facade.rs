use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, info};

use common::api_error::RouteError;
use common::schemas::{Collection, FileInfo, ImageTransformParam, VideoCompressParam};

use crate::core::balance::choose_server;
use crate::core::fs_client::FileServerClient;
use crate::core::link::Link;
use crate::core::registry::Registry;
use crate::core::server::Server;

const IMAGE_MODULE: &str = "image";
const IMAGE_CROP_RESIZE: &str = "cropresize";
const VIDEO_MODULE: &str = "video";
const VIDEO_DASH: &str = "dash";

/// Public entry point: resolves links and clusters against the registry and
/// hands the chosen server to a [`FileServerClient`].
#[derive(Clone)]
pub struct FsRouter {
    registry: Arc<Registry>,
    http: Client,
}

impl FsRouter {
    pub fn new(registry: Arc<Registry>, http: Client) -> Self {
        Self { registry, http }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn resolve_url(&self, link: &Link) -> Result<String, RouteError> {
        link.to_url(&self.registry)
    }

    pub fn link_from_url(&self, url: &str) -> Option<Link> {
        Link::from_url(url, &self.registry)
    }

    /// Server that owns `link`. Bare paths carry no owner and are rejected.
    pub fn resolve_server_for_read(&self, link: &Link) -> Result<Server, RouteError> {
        if !link.is_routable() {
            return Err(RouteError::MalformedAddress(link.to_string()));
        }
        let parts = link.parts();
        self.registry
            .get_server(parts.cluster_id, parts.server_id)
            .ok_or_else(|| RouteError::server_not_found(parts.cluster_id, parts.server_id))
    }

    pub fn resolve_server_for_write(&self, cluster_id: &str) -> Result<Server, RouteError> {
        let cluster = self
            .registry
            .get_cluster(cluster_id)
            .ok_or_else(|| RouteError::ClusterNotFound(cluster_id.to_string()))?;

        choose_server(&cluster)
            .cloned()
            .ok_or_else(|| RouteError::NoAvailableServer(cluster_id.to_string()))
    }

    fn client_for(&self, server: &Server) -> FileServerClient {
        FileServerClient::new(self.http.clone(), server.local_address.clone())
    }

    #[tracing::instrument(name = "router.stat", skip(self), fields(link = %link))]
    pub async fn stat(&self, link: &Link) -> Result<FileInfo, RouteError> {
        let server = self.resolve_server_for_read(link)?;
        self.client_for(&server).stat(link.path()).await
    }

    #[tracing::instrument(name = "router.ls", skip(self), fields(link = %link))]
    pub async fn ls(&self, link: &Link) -> Result<Vec<FileInfo>, RouteError> {
        let server = self.resolve_server_for_read(link)?;
        self.client_for(&server).ls(link.path()).await
    }

    #[tracing::instrument(name = "router.read", skip(self), fields(link = %link))]
    pub async fn read(&self, link: &Link) -> Result<Vec<u8>, RouteError> {
        let server = self.resolve_server_for_read(link)?;
        self.client_for(&server).read(link.path()).await
    }

    /// Writes to the least-loaded available server of `cluster_id`.
    #[tracing::instrument(name = "router.write", skip(self, reader))]
    pub async fn write<R>(
        &self,
        reader: R,
        cluster_id: &str,
        file_name: &str,
        collection: Collection,
    ) -> Result<Link, RouteError>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        let server = self.resolve_server_for_write(cluster_id)?;
        debug!(server_id = %server.server_id, free_space_mb = server.free_space_mb, "chose server for write");
        self.write_server(&server, reader, file_name, collection).await
    }

    /// Writes to one specific server, bypassing the balancer.
    #[tracing::instrument(name = "router.write_to", skip(self, reader))]
    pub async fn write_to<R>(
        &self,
        reader: R,
        cluster_id: &str,
        server_id: &str,
        file_name: &str,
        collection: Collection,
    ) -> Result<Link, RouteError>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        let server = self
            .registry
            .get_server(cluster_id, server_id)
            .ok_or_else(|| RouteError::server_not_found(cluster_id, server_id))?;
        self.write_server(&server, reader, file_name, collection).await
    }

    async fn write_server<R>(
        &self,
        server: &Server,
        reader: R,
        file_name: &str,
        collection: Collection,
    ) -> Result<Link, RouteError>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        let rel_path = self
            .client_for(server)
            .write(reader, file_name, collection)
            .await?;
        let link = Link::try_new(&server.cluster_id, &server.server_id, &rel_path)?;
        info!(link = %link, "stored file");
        Ok(link)
    }

    /// Invokes `module.method` on the server that owns `link`.
    pub async fn call<A, T>(
        &self,
        link: &Link,
        module: &str,
        method: &str,
        args: &A,
    ) -> Result<T, RouteError>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let server = self.resolve_server_for_read(link)?;
        self.client_for(&server).call(module, method, args).await
    }

    pub async fn call_async<A>(
        &self,
        link: &Link,
        module: &str,
        method: &str,
        args: &A,
    ) -> Result<(), RouteError>
    where
        A: Serialize + ?Sized,
    {
        let server = self.resolve_server_for_read(link)?;
        self.client_for(&server).call_async(module, method, args).await
    }

    /// Crops (`[x, y, w, h]`, or nothing) and resizes (`[[w, h], ..]`) an image
    /// on its own server. Results live on the same server as the source.
    #[tracing::instrument(name = "router.image_crop_resize", skip(self), fields(link = %link))]
    pub async fn image_crop_resize(
        &self,
        link: &Link,
        crop: &[i64],
        sizes: &[Vec<i64>],
    ) -> Result<Vec<Link>, RouteError> {
        if !crop.is_empty() && crop.len() != 4 {
            return Err(RouteError::InvalidArgument(
                "crop must be [x, y, w, h]".to_string(),
            ));
        }
        if sizes.iter().any(|size| size.len() != 2) {
            return Err(RouteError::InvalidArgument(
                "sizes must be [[w, h], ..]".to_string(),
            ));
        }

        let param = ImageTransformParam {
            file_path: link.path().to_string(),
            crop: crop.to_vec(),
            resize: sizes.to_vec(),
        };
        let paths: Vec<String> = self
            .call(link, IMAGE_MODULE, IMAGE_CROP_RESIZE, &param)
            .await?;

        Ok(paths
            .iter()
            .map(|p| Link::new(link.cluster_id(), link.server_id(), p))
            .collect())
    }

    /// Starts DASH transcoding of a video; progress is reported under
    /// `progress_key` by the server.
    #[tracing::instrument(name = "router.video_compress_dash", skip(self), fields(link = %link))]
    pub async fn video_compress_dash(
        &self,
        link: &Link,
        video_id: i64,
        progress_key: &str,
    ) -> Result<(), RouteError> {
        let param = VideoCompressParam {
            file: link.path().to_string(),
            progress_redis_key: progress_key.to_string(),
            video_id,
        };
        self.call_async(link, VIDEO_MODULE, VIDEO_DASH, &param).await
    }
}
