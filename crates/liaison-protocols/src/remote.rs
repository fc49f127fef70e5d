//! Directory over TCP.
//!
//! [`DirectoryServer`] exposes a [`MemoryDirectory`] on a TCP port using one
//! JSON object per line. [`RemoteDirectory`] is the matching client and
//! implements [`Directory`], so agents in separate processes share one
//! registry.
//!
//! ```text
//! > {"cmd":"register","endpoint":{"name":"parser@mesh","addr":"127.0.0.1:7101"},"role":"parser"}
//! < {"status":"ok"}
//! > {"cmd":"search","role":"parser"}
//! < {"status":"records","records":[...]}
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::directory::{Directory, MemoryDirectory, ServiceRecord};
use crate::envelope::EndpointRef;
use crate::error::{Error, Result};
use crate::tcp::CONNECT_TIMEOUT;

/// Command sent to the directory server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DirectoryRequest {
    Register { endpoint: EndpointRef, role: String },
    Deregister { endpoint: EndpointRef },
    Search {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<String>,
    },
}

/// Response from the directory server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DirectoryResponse {
    Ok,
    Records { records: Vec<ServiceRecord> },
    Error { error: String },
}

/// TCP front end of a [`MemoryDirectory`].
pub struct DirectoryServer {
    directory: Arc<MemoryDirectory>,
    listener: TcpListener,
}

impl DirectoryServer {
    /// Bind the server. Port 0 picks a free port.
    pub async fn bind(directory: Arc<MemoryDirectory>, addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            directory,
            listener,
        })
    }

    /// Address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the task is dropped.
    pub async fn run(self) -> Result<()> {
        info!("Directory listening on {}", self.listener.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let directory = Arc::clone(&self.directory);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, directory).await {
                            warn!("Directory connection error from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    warn!("Failed to accept directory connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, directory: Arc<MemoryDirectory>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<DirectoryRequest>(&line) {
            Ok(request) => execute(request, directory.as_ref()).await,
            Err(e) => DirectoryResponse::Error {
                error: format!("Invalid command: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer.write_all(response_json.as_bytes()).await?;
        line.clear();
    }

    Ok(())
}

async fn execute(request: DirectoryRequest, directory: &MemoryDirectory) -> DirectoryResponse {
    let result = match request {
        DirectoryRequest::Register { endpoint, role } => directory
            .register(&endpoint, &role)
            .await
            .map(|_| DirectoryResponse::Ok),
        DirectoryRequest::Deregister { endpoint } => directory
            .deregister(&endpoint)
            .await
            .map(|_| DirectoryResponse::Ok),
        DirectoryRequest::Search { role } => directory
            .search(role.as_deref())
            .await
            .map(|records| DirectoryResponse::Records { records }),
    };
    result.unwrap_or_else(|e| DirectoryResponse::Error {
        error: e.to_string(),
    })
}

/// Upper bound on one directory request, connect to response.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for a [`DirectoryServer`].
#[derive(Debug, Clone)]
pub struct RemoteDirectory {
    addr: String,
    timeout: Duration,
}

impl RemoteDirectory {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Set the deadline of a whole request.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn call(&self, request: &DirectoryRequest) -> Result<DirectoryResponse> {
        let response = tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| {
                warn!(addr = %self.addr, timeout = ?self.timeout, "Directory did not answer");
                Error::Timeout(self.timeout)
            })??;

        match response {
            DirectoryResponse::Error { error } => Err(Error::Directory(error)),
            other => Ok(other),
        }
    }

    async fn exchange(&self, request: &DirectoryRequest) -> Result<DirectoryResponse> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| Error::Timeout(CONNECT_TIMEOUT))?
            .map_err(|e| Error::Directory(format!("{}: {}", self.addr, e)))?;

        let (reader, mut writer) = stream.into_split();
        let line = serde_json::to_string(request)? + "\n";
        writer.write_all(line.as_bytes()).await?;

        let mut reader = BufReader::new(reader);
        let mut response = String::new();
        if reader.read_line(&mut response).await? == 0 {
            return Err(Error::Directory("connection closed before response".into()));
        }
        debug!(addr = %self.addr, "Directory response received");
        Ok(serde_json::from_str(&response)?)
    }
}

#[async_trait]
impl Directory for RemoteDirectory {
    async fn register(&self, endpoint: &EndpointRef, role: &str) -> Result<()> {
        self.call(&DirectoryRequest::Register {
            endpoint: endpoint.clone(),
            role: role.to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn deregister(&self, endpoint: &EndpointRef) -> Result<()> {
        self.call(&DirectoryRequest::Deregister {
            endpoint: endpoint.clone(),
        })
        .await
        .map(|_| ())
    }

    async fn search(&self, role: Option<&str>) -> Result<Vec<ServiceRecord>> {
        match self
            .call(&DirectoryRequest::Search {
                role: role.map(str::to_string),
            })
            .await?
        {
            DirectoryResponse::Records { records } => Ok(records),
            other => Err(Error::InvalidMessage(format!(
                "unexpected search response: {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DirectoryClient;

    async fn start() -> (Arc<MemoryDirectory>, RemoteDirectory) {
        let directory = MemoryDirectory::new();
        let server = DirectoryServer::bind(Arc::clone(&directory), "127.0.0.1:0")
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        (directory, RemoteDirectory::new(addr.to_string()))
    }

    #[tokio::test]
    async fn remote_register_and_lookup() {
        let (local, remote) = start().await;
        let parser = EndpointRef::new("parser@mesh", "127.0.0.1:7101");
        tokio_test::assert_ok!(remote.register(&parser, "parser").await);
        assert_eq!(local.len(), 1);

        let client = DirectoryClient::new(Arc::new(remote.clone()));
        assert_eq!(client.lookup("parser").await.unwrap(), vec![parser.clone()]);
        assert!(client.lookup("logic").await.unwrap().is_empty());

        remote.deregister(&parser).await.unwrap();
        assert!(client.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_command_gets_error_response() {
        let (_local, remote) = start().await;
        let stream = TcpStream::connect(remote.addr()).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        writer.write_all(b"{\"cmd\":\"explode\"}\n").await.unwrap();

        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let response: DirectoryResponse = serde_json::from_str(&line).unwrap();
        assert!(matches!(response, DirectoryResponse::Error { .. }));
    }

    #[tokio::test]
    async fn unreachable_directory_is_an_error() {
        let vacant = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let remote = RemoteDirectory::new(vacant.to_string());
        assert!(remote.search(None).await.is_err());
    }

    #[tokio::test]
    async fn stalled_directory_times_out() {
        // Accepts connections but never answers.
        let stalled = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = stalled.local_addr().unwrap();
        let held = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((stream, _)) = stalled.accept().await {
                open.push(stream);
            }
        });

        let remote = RemoteDirectory::new(addr.to_string()).with_timeout(Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = remote.search(Some("logic")).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(t) if t == Duration::from_millis(200)));
        assert!(started.elapsed() < Duration::from_secs(2));

        let client = DirectoryClient::new(Arc::new(remote));
        assert!(client.lookup("logic").await.is_err());
        held.abort();
    }

    #[test]
    fn request_wire_format() {
        let json = serde_json::to_string(&DirectoryRequest::Search {
            role: Some("logic".into()),
        })
        .unwrap();
        assert_eq!(json, r#"{"cmd":"search","role":"logic"}"#);
        assert_eq!(
            serde_json::to_string(&DirectoryResponse::Ok).unwrap(),
            r#"{"status":"ok"}"#
        );
    }
}
