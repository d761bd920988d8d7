//! Scripted NNTP server on localhost
//!
//! Serves a fixed set of groups and articles, records every command it receives and
//! can simulate a busy server, a dropped connection or a body that stalls mid-transfer.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Builder for [`MockServer`]
#[derive(Default)]
pub struct MockServerBuilder {
    groups: HashSet<String>,
    articles: HashMap<String, Vec<u8>>,
    credentials: Option<(String, String)>,
    always_busy: bool,
    busy_after: Option<usize>,
    stall_on: Option<String>,
    hang_up_on: Option<String>,
}

impl MockServerBuilder {
    /// Serve `name` (GROUP answers 211)
    pub fn group(mut self, name: &str) -> Self {
        self.groups.insert(name.to_string());
        self
    }

    /// Serve `body` for `message_id` (given without angle brackets)
    pub fn article(mut self, message_id: &str, body: impl Into<Vec<u8>>) -> Self {
        self.articles.insert(message_id.to_string(), body.into());
        self
    }

    /// Require AUTHINFO with these credentials
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some((username.to_string(), password.to_string()));
        self
    }

    /// Greet every connection with 400
    pub fn always_busy(mut self) -> Self {
        self.always_busy = true;
        self
    }

    /// Serve the first `connections` connections, then greet every later one with 400
    pub fn busy_after(mut self, connections: usize) -> Self {
        self.busy_after = Some(connections);
        self
    }

    /// Drop the connection when BODY or STAT asks for `message_id`
    pub fn hang_up_on(mut self, message_id: &str) -> Self {
        self.hang_up_on = Some(message_id.to_string());
        self
    }

    /// Send only part of `message_id`'s body, then go quiet
    pub fn stall_on(mut self, message_id: &str) -> Self {
        self.stall_on = Some(message_id.to_string());
        self
    }

    /// Bind to an ephemeral port and start accepting
    pub async fn start(self) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState {
            script: self,
            connections: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
            stalled: Notify::new(),
        });

        let accept_state = state.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let number = accept_state.connections.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::spawn(serve(socket, number, accept_state.clone()));
            }
        });

        MockServer {
            addr,
            state,
            handle,
        }
    }
}

struct MockState {
    script: MockServerBuilder,
    connections: AtomicUsize,
    commands: Mutex<Vec<String>>,
    stalled: Notify,
}

/// A running mock server; stops accepting when dropped
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Start building a server
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::default()
    }

    /// Listening address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Connections accepted so far
    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Every command line received, across all connections
    pub fn commands(&self) -> Vec<String> {
        self.state.commands.lock().unwrap().clone()
    }

    /// Received commands starting with `verb`
    pub fn commands_starting_with(&self, verb: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.starts_with(verb))
            .collect()
    }

    /// Resolves once the stalling body has been partially sent
    pub async fn stalled(&self) {
        self.state.stalled.notified().await;
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(socket: TcpStream, number: usize, state: Arc<MockState>) {
    let (reader, mut writer) = socket.into_split();
    let script = &state.script;

    if script.always_busy || script.busy_after.is_some_and(|n| number > n) {
        writer.write_all(b"400 too many connections\r\n").await.ok();
        return;
    }
    if writer.write_all(b"200 mock news server ready\r\n").await.is_err() {
        return;
    }

    let mut lines = BufReader::new(reader).lines();
    let mut user = None;

    while let Ok(Some(line)) = lines.next_line().await {
        state.commands.lock().unwrap().push(line.clone());
        let (verb, arg) = match line.split_once(' ') {
            Some((verb, arg)) => (verb.to_ascii_uppercase(), arg.trim().to_string()),
            None => (line.trim().to_ascii_uppercase(), String::new()),
        };

        let reply: Vec<u8> = match verb.as_str() {
            "AUTHINFO" => match arg.split_once(' ') {
                Some((kind, value)) if kind.eq_ignore_ascii_case("USER") => {
                    user = Some(value.to_string());
                    b"381 password required\r\n".to_vec()
                }
                Some((kind, value)) if kind.eq_ignore_ascii_case("PASS") => {
                    let accepted = match &script.credentials {
                        Some((u, p)) => user.as_deref() == Some(u.as_str()) && value == p.as_str(),
                        None => true,
                    };
                    if accepted {
                        b"281 authentication accepted\r\n".to_vec()
                    } else {
                        b"452 authentication rejected\r\n".to_vec()
                    }
                }
                _ => b"501 syntax error\r\n".to_vec(),
            },
            "MODE" => b"200 reader mode\r\n".to_vec(),
            "GROUP" => {
                if script.groups.contains(&arg) {
                    format!("211 1 1 1 {arg}\r\n").into_bytes()
                } else {
                    b"411 no such group\r\n".to_vec()
                }
            }
            "STAT" => {
                let id = strip_brackets(&arg);
                if script.hang_up_on.as_deref() == Some(id) {
                    return;
                }
                if script.articles.contains_key(id) {
                    format!("223 0 <{id}>\r\n").into_bytes()
                } else {
                    b"430 no such article\r\n".to_vec()
                }
            }
            "BODY" => {
                let id = strip_brackets(&arg);
                if script.hang_up_on.as_deref() == Some(id) {
                    return;
                }
                match script.articles.get(id) {
                    Some(body) if script.stall_on.as_deref() == Some(id) => {
                        let mut reply = format!("222 0 <{id}> body follows\r\n").into_bytes();
                        reply.extend_from_slice(&body[..body.len() / 2]);
                        writer.write_all(&reply).await.ok();
                        writer.flush().await.ok();
                        state.stalled.notify_one();
                        continue;
                    }
                    Some(body) => {
                        let mut reply = format!("222 0 <{id}> body follows\r\n").into_bytes();
                        reply.extend_from_slice(&dot_stuff(body));
                        reply.extend_from_slice(b".\r\n");
                        reply
                    }
                    None => b"430 no such article\r\n".to_vec(),
                }
            }
            "QUIT" => {
                writer.write_all(b"205 bye\r\n").await.ok();
                break;
            }
            _ => b"500 unknown command\r\n".to_vec(),
        };

        if writer.write_all(&reply).await.is_err() {
            break;
        }
    }
}

fn strip_brackets(id: &str) -> &str {
    id.trim_start_matches('<').trim_end_matches('>')
}

/// Double the leading dot of every line
fn dot_stuff(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 16);
    for line in body.split_inclusive(|&b| b == b'\n') {
        if line.first() == Some(&b'.') {
            out.push(b'.');
        }
        out.extend_from_slice(line);
    }
    out
}
