// API client module: a small blocking HTTP client that logs in as one
// principal and then makes authorized calls on its behalf. Everything is
// synchronous; a call finishes before its result is handed back.

use crate::config::ClientConfig;
use crate::error::ApiError;
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs::File;
use std::io::{self, Read, Write};
use std::iter::FusedIterator;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Size of the chunks yielded by [`ByteChunks`].
pub const CHUNK_SIZE: usize = 4096;

/// Token and the header derived from it. Stored as one value so the two
/// can never disagree.
#[derive(Clone)]
struct Session {
    token: String,
    header: HeaderValue,
}

/// Stateful client for one login. Holds a reqwest blocking client, the
/// identity it logs in with, and the session token once it has one.
#[derive(Clone)]
pub struct ApiBase {
    client: Client,
    config: ClientConfig,
    base_url: Url,
    session: Option<Session>,
}

impl ApiBase {
    /// Create a client for `config`. No request is made until
    /// [`authenticate`](Self::authenticate) or [`register`](Self::register).
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| ApiError::InvalidUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        // reqwest's blocking client times out after 30s by default; the
        // calls here wait as long as the server does.
        let client = Client::builder().timeout(None::<Duration>).build()?;
        Ok(ApiBase {
            client,
            config,
            base_url,
            session: None,
        })
    }

    /// Log in with the configured credentials and keep the returned token.
    ///
    /// Only 200 counts as success. 422 and 401 become the credential
    /// errors; every other status, other 2xx codes included, is
    /// [`ApiError::Http`].
    #[instrument(skip_all, fields(login = %self.config.login_name))]
    pub fn authenticate(&mut self) -> Result<&mut Self, ApiError> {
        let url = self.url(&format!("/authenticate_{}", self.config.login_type))?;
        debug!(target: "api_test_client.api", url = %url, "Authenticating");

        let response = self.client.post(url).form(&self.credentials()).send()?;
        match response.status() {
            StatusCode::OK => self.set_session(response)?,
            StatusCode::UNPROCESSABLE_ENTITY => {
                warn!(target: "api_test_client.api", "Unknown login name");
                return Err(ApiError::UnknownIdentity {
                    login_name: self.config.login_name.clone(),
                    login_type: self.config.login_type.clone(),
                });
            }
            StatusCode::UNAUTHORIZED => {
                warn!(target: "api_test_client.api", "Password rejected");
                return Err(ApiError::BadPassword {
                    login_name: self.config.login_name.clone(),
                });
            }
            _ => return Err(http_error(response)),
        }
        Ok(self)
    }

    /// Create the principal on the server and keep the returned token.
    /// An empty `group` is treated the same as none.
    #[instrument(skip_all, fields(login = %self.config.login_name))]
    pub fn register(&mut self, group: Option<&str>) -> Result<&mut Self, ApiError> {
        let url = self.url(&format!("/api/v1/{}s", self.config.login_type))?;
        let mut data = self.credentials();
        if let Some(group) = group.filter(|g| !g.is_empty()) {
            data.insert("group".to_string(), group.to_string());
        }
        debug!(target: "api_test_client.api", url = %url, "Registering");

        let response = self.client.post(url).form(&data).send()?;
        if response.status() != StatusCode::OK {
            return Err(http_error(response));
        }
        self.set_session(response)?;
        Ok(self)
    }

    /// Fetch the signed-download token for a file, then stream the file.
    pub fn download_file(&self, file_id: impl Display) -> Result<ByteChunks, ApiError> {
        let response = self
            .request(Method::GET, &format!("/api/v1/files/{}", file_id))?
            .send()?;
        let body = check_response(response)?;
        self.download_signed(json_str(&body, "jwt")?)
    }

    /// Upload `file_path` to `url` as multipart form data alongside the
    /// JSON-encoded `properties`, returning the new recording id.
    #[instrument(skip_all, fields(url = %url))]
    pub fn upload(
        &self,
        url: &str,
        file_path: impl AsRef<Path>,
        properties: &impl Serialize,
    ) -> Result<String, ApiError> {
        let file_path = file_path.as_ref();
        let request = self.request(Method::POST, url)?;
        let data = serde_json::to_string(properties)?;

        // The part owns the file; it is closed once the request is done
        // with it, whether or not the send succeeds.
        let file = File::open(file_path)?;
        let length = file.metadata()?.len();
        let file_name = file_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload")
            .to_string();
        let part = multipart::Part::reader_with_length(file, length).file_name(file_name);
        let form = multipart::Form::new().text("data", data).part("file", part);

        debug!(target: "api_test_client.api", bytes = length, "Uploading file");
        let body = check_response(request.multipart(form).send()?)?;
        recording_id(&body)
    }

    pub fn login_name(&self) -> &str {
        &self.config.login_name
    }

    pub fn login_type(&self) -> &str {
        &self.config.login_type
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Whether a token has been obtained.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Build an authorized request for a path relative to the base URL.
    pub(crate) fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let session = self.session.as_ref().ok_or(ApiError::NotAuthenticated)?;
        let url = self.url(path)?;
        debug!(target: "api_test_client.api", method = %method, url = %url, "Authorized request");
        Ok(self
            .client
            .request(method, url)
            .header(AUTHORIZATION, session.header.clone()))
    }

    /// Redeem a signed-download token. This request carries no
    /// Authorization header; the token in the query is the credential.
    pub(crate) fn download_signed(&self, token: &str) -> Result<ByteChunks, ApiError> {
        let url = self.url("/api/v1/signedUrl")?;
        let response = self.client.get(url).query(&[("jwt", token)]).send()?;
        if !response.status().is_success() {
            return Err(http_error(response));
        }
        Ok(ByteChunks::from_response(response))
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url.join(path).map_err(|e| ApiError::InvalidUrl {
            url: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// `{<type>name: <login>, password: <password>}`
    fn credentials(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(
            format!("{}name", self.config.login_type),
            self.config.login_name.clone(),
        );
        map.insert("password".to_string(), self.config.password.clone());
        map
    }

    fn set_session(&mut self, response: Response) -> Result<(), ApiError> {
        let body = parse_json(response)?;
        let token = json_str(&body, "token")?;
        let mut header = HeaderValue::from_str(token)?;
        header.set_sensitive(true);
        self.session = Some(Session {
            token: token.to_string(),
            header,
        });
        info!(target: "api_test_client.api", login = %self.config.login_name, "Session token set");
        Ok(())
    }

    /// The current session token, if any. Read-only.
    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }
}

/// Return the parsed JSON body of a 200 response, or an
/// [`ApiError::Http`] carrying the status and raw body otherwise.
pub(crate) fn check_response(response: Response) -> Result<Value, ApiError> {
    if response.status() != StatusCode::OK {
        return Err(http_error(response));
    }
    parse_json(response)
}

/// Read the whole body and parse it. A body that is not JSON is
/// [`ApiError::Json`]; only reading it can fail with `Transport`.
pub(crate) fn parse_json(response: Response) -> Result<Value, ApiError> {
    let text = response.text()?;
    Ok(serde_json::from_str(&text)?)
}

pub(crate) fn http_error(response: Response) -> ApiError {
    let status = response.status();
    let body = response.text().unwrap_or_else(|_| "".into());
    warn!(target: "api_test_client.api", status = %status, "Request failed");
    ApiError::Http {
        status: status.as_u16(),
        body,
    }
}

pub(crate) fn json_str<'a>(body: &'a Value, key: &'static str) -> Result<&'a str, ApiError> {
    body.get(key)
        .and_then(Value::as_str)
        .ok_or(ApiError::MissingField(key))
}

/// `recordingId` may come back as a string or a number.
fn recording_id(body: &Value) -> Result<String, ApiError> {
    match body.get("recordingId") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ApiError::MissingField("recordingId")),
    }
}

/// Forward-only iterator over a download, [`CHUNK_SIZE`] bytes at a time.
///
/// Each chunk is read from the underlying stream when `next` is called, so
/// the payload is never held in memory as a whole. Every chunk except the
/// last is full-sized. After the end of the stream or a read error the
/// iterator returns `None`; a fresh download needs a fresh call.
pub struct ByteChunks<R = Response> {
    reader: R,
    chunk_size: usize,
    content_length: Option<u64>,
    done: bool,
}

impl<R: Read> ByteChunks<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, CHUNK_SIZE)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        ByteChunks {
            reader,
            chunk_size: chunk_size.max(1),
            content_length: None,
            done: false,
        }
    }

    /// Total size announced by the server, when it sent one.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Drain the remaining chunks into `out`, returning the bytes written.
    pub fn write_to<W: Write>(self, out: &mut W) -> Result<u64, ApiError> {
        let mut written = 0u64;
        for chunk in self {
            let chunk = chunk?;
            out.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        Ok(written)
    }
}

impl ByteChunks<Response> {
    fn from_response(response: Response) -> Self {
        let content_length = response.content_length();
        ByteChunks {
            content_length,
            ..ByteChunks::new(response)
        }
    }
}

impl<R: Read> Iterator for ByteChunks<R> {
    type Item = Result<Vec<u8>, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut chunk = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < chunk.len() {
            match self.reader.read(&mut chunk[filled..]) {
                Ok(0) => {
                    self.done = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(read_error(e)));
                }
            }
        }
        if filled == 0 {
            return None;
        }
        chunk.truncate(filled);
        Some(Ok(chunk))
    }
}

impl<R: Read> FusedIterator for ByteChunks<R> {}

/// reqwest reports a broken stream as an `io::Error` wrapping its own
/// error; hand that back as `Transport` and keep the rest as `Io`.
fn read_error(e: io::Error) -> ApiError {
    if !e.get_ref().map_or(false, |inner| inner.is::<reqwest::Error>()) {
        return ApiError::Io(e);
    }
    let kind = e.kind();
    match e.into_inner().map(|inner| inner.downcast::<reqwest::Error>()) {
        Some(Ok(inner)) => ApiError::Transport(*inner),
        Some(Err(inner)) => ApiError::Io(io::Error::new(kind, inner)),
        None => ApiError::Io(kind.into()),
    }
}
