use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use common::api_error::RouteError;
use common::constants::{
    CALL_ARGS_FIELD, CALL_ASYNC_PREFIX, CALL_PREFIX, FS_LS_PREFIX, FS_READ_PREFIX, FS_STAT_PREFIX,
    FS_WRITE_PREFIX, PATH_SEP, WRITE_FILE_FIELD,
};
use common::schemas::{Collection, FileInfo, JsonResult};
use common::trace_context::inject_trace_context_reqwest;

/// HTTP client for one file server, addressed by its local address.
#[derive(Clone, Debug)]
pub struct FileServerClient {
    http: Client,
    server: String,
}

impl FileServerClient {
    pub fn new(http: Client, server: impl Into<String>) -> Self {
        let server: String = server.into();
        Self {
            http,
            server: server.trim_end_matches(PATH_SEP).to_string(),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn endpoint(&self, prefix: &str, path: &str) -> String {
        if path.is_empty() || path.starts_with(PATH_SEP) {
            format!("{}{}{}", self.server, prefix, path)
        } else {
            format!("{}{}/{}", self.server, prefix, path)
        }
    }

    pub async fn stat(&self, path: &str) -> Result<FileInfo, RouteError> {
        let resp = send(self.http.get(self.endpoint(FS_STAT_PREFIX, path))).await?;
        require(envelope(resp).await?, "stat")
    }

    pub async fn ls(&self, path: &str) -> Result<Vec<FileInfo>, RouteError> {
        let resp = send(self.http.get(self.endpoint(FS_LS_PREFIX, path))).await?;
        Ok(envelope(resp).await?.unwrap_or_default())
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>, RouteError> {
        let resp = send(self.http.get(self.endpoint(FS_READ_PREFIX, path))).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// Streams `reader` to the server and returns the relative path it was
    /// stored under.
    pub async fn write<R>(
        &self,
        reader: R,
        file_name: &str,
        collection: Collection,
    ) -> Result<String, RouteError>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        let body = Body::wrap_stream(ReaderStream::new(reader));
        let part = Part::stream(body).file_name(file_name.to_string());
        let form = Form::new().part(WRITE_FILE_FIELD, part);

        let url = self.endpoint(FS_WRITE_PREFIX, collection.as_str());
        let resp = send(self.http.post(url).multipart(form)).await?;
        require(envelope(resp).await?, "write")
    }

    pub async fn call<A, T>(&self, module: &str, method: &str, args: &A) -> Result<T, RouteError>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.post_call(CALL_PREFIX, module, method, args).await?;
        require(envelope(resp).await?, "call")
    }

    /// Fire-and-forget variant: the server acknowledges and runs the method in
    /// the background.
    pub async fn call_async<A>(&self, module: &str, method: &str, args: &A) -> Result<(), RouteError>
    where
        A: Serialize + ?Sized,
    {
        let resp = self.post_call(CALL_ASYNC_PREFIX, module, method, args).await?;
        envelope::<serde_json::Value>(resp).await?;
        Ok(())
    }

    async fn post_call<A>(
        &self,
        prefix: &str,
        module: &str,
        method: &str,
        args: &A,
    ) -> Result<Response, RouteError>
    where
        A: Serialize + ?Sized,
    {
        let json_args = serde_json::to_string(args)?;
        let url = format!("{}{}/{}/{}", self.server, prefix, module, method);
        send(self.http.post(url).form(&[(CALL_ARGS_FIELD, json_args)])).await
    }
}

async fn send(builder: RequestBuilder) -> Result<Response, RouteError> {
    let resp = inject_trace_context_reqwest(builder).send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(RouteError::UpstreamStatus { status, body });
    }
    Ok(resp)
}

async fn envelope<T: DeserializeOwned>(resp: Response) -> Result<Option<T>, RouteError> {
    let bytes = resp.bytes().await?;
    let result: JsonResult<T> = serde_json::from_slice(&bytes)?;
    result.into_data()
}

fn require<T>(data: Option<T>, op: &str) -> Result<T, RouteError> {
    data.ok_or_else(|| RouteError::UpstreamRejected(format!("{} returned no data", op)))
}
