//! In-process fake IMAP server for integration testing
//!
//! ## Connection lifecycle
//!
//! ```text
//!   Client connects via TCP
//!       |
//!   (tls)       TLS handshake, then greeting
//!   (starttls)  greeting, STARTTLS, TLS handshake
//!   (plain)     greeting
//!       |
//!   ID (optional), LOGIN
//!       |
//!   LIST, SELECT, UID SEARCH, UID FETCH ...
//!       |
//!   LOGOUT
//! ```
//!
//! ## Command format
//!
//! Every command starts with a tag the client picks (async-imap uses
//! `A0001`, `A0002`, ...). The server echoes it in the final tagged
//! response; lines starting with `*` are untagged data sent before it.
//!
//! ```text
//!   Client:  A0002 LIST "" "*"
//!   Server:  * LIST (\HasNoChildren) "/" "INBOX"
//!   Server:  A0002 OK LIST completed
//! ```
//!
//! Most commands are parsed with `imap-codec`. `ID` and `LOGIN` are
//! handled from the raw line: the first is an extension the codec may
//! not know, the second needs the plain credential strings.

use super::handlers::{
    handle_id, handle_list, handle_login, handle_logout, handle_select, handle_uid_fetch,
    handle_uid_search, parse_login_args,
};
use super::io::write_line;
use super::mailbox::Mailbox;
use imap_codec::CommandCodec;
use imap_codec::decode::Decoder;
use imap_codec::imap_types::command::CommandBody;
use imap_codec::imap_types::mailbox::Mailbox as ImapMailbox;
use mailfetch::TransportMode;
use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

const GREETING: &str = "* OK IMAP4rev1 Fake server ready\r\n";

/// Counters the tests can assert on.
#[derive(Debug, Default)]
struct Stats {
    logins: AtomicUsize,
    id_commands: AtomicUsize,
    flaky_select_tripped: AtomicBool,
}

/// A fake IMAP server on `127.0.0.1` with an OS-assigned port.
///
/// A self-signed certificate for `127.0.0.1` is generated at startup,
/// so TLS clients must accept invalid certificates.
pub struct FakeImapServer {
    port: u16,
    stats: Arc<Stats>,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeImapServer {
    /// Start a plaintext server.
    pub async fn start(mailbox: Mailbox) -> Self {
        Self::start_with(mailbox, TransportMode::Plain).await
    }

    /// Start a server speaking `transport`. Runs until dropped.
    pub async fn start_with(mailbox: Mailbox, transport: TransportMode) -> Self {
        // Several tests may race to install the provider; losing is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let acceptor = tls_acceptor();
        let mailbox = Arc::new(mailbox);
        let stats = Arc::new(Stats::default());

        let handle = {
            let stats = stats.clone();
            tokio::spawn(async move {
                while let Ok((stream, _addr)) = listener.accept().await {
                    let acceptor = acceptor.clone();
                    let mailbox = mailbox.clone();
                    let stats = stats.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, transport, acceptor, &mailbox, &stats).await;
                    });
                }
            })
        };

        Self {
            port,
            stats,
            handle,
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Number of LOGIN commands received, accepted or not.
    pub fn logins(&self) -> usize {
        self.stats.logins.load(Ordering::SeqCst)
    }

    /// Number of ID commands received.
    pub fn id_commands(&self) -> usize {
        self.stats.id_commands.load(Ordering::SeqCst)
    }
}

impl Drop for FakeImapServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn tls_acceptor() -> TlsAcceptor {
    let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
        .expect("generate self-signed cert");

    let cert_der = cert.cert.der().clone();
    let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key_der.into())
        .expect("build server TLS config");

    TlsAcceptor::from(Arc::new(tls_config))
}

async fn handle_connection(
    stream: TcpStream,
    transport: TransportMode,
    acceptor: TlsAcceptor,
    mailbox: &Mailbox,
    stats: &Stats,
) {
    match transport {
        TransportMode::Plain => {
            let mut reader = BufReader::new(stream);
            if write_line(&mut reader, GREETING).await.is_ok() {
                handle_imap_session(reader, mailbox, stats).await;
            }
        }
        TransportMode::Tls => {
            let Ok(tls_stream) = acceptor.accept(stream).await else {
                return;
            };
            let mut reader = BufReader::new(tls_stream);
            if write_line(&mut reader, GREETING).await.is_ok() {
                handle_imap_session(reader, mailbox, stats).await;
            }
        }
        TransportMode::StartTls => {
            let Some(tcp) = negotiate_starttls(stream).await else {
                return;
            };
            let Ok(tls_stream) = acceptor.accept(tcp).await else {
                return;
            };
            handle_imap_session(BufReader::new(tls_stream), mailbox, stats).await;
        }
    }
}

/// Greet in plaintext and wait for STARTTLS. Returns the raw socket
/// ready for the TLS handshake.
async fn negotiate_starttls(stream: TcpStream) -> Option<TcpStream> {
    let mut reader = BufReader::new(stream);
    write_line(&mut reader, GREETING).await.ok()?;

    let mut line = String::new();
    reader.read_line(&mut line).await.ok()?;

    let (tag, command) = line.trim().split_once(' ')?;
    if !command.eq_ignore_ascii_case("STARTTLS") {
        let _ = write_line(&mut reader, &format!("{tag} BAD Expected STARTTLS\r\n")).await;
        return None;
    }

    write_line(&mut reader, &format!("{tag} OK Begin TLS negotiation now\r\n"))
        .await
        .ok()?;
    Some(reader.into_inner())
}

fn mailbox_name(mb: &ImapMailbox<'_>) -> String {
    match mb {
        ImapMailbox::Inbox => "INBOX".to_string(),
        ImapMailbox::Other(other) => {
            let bytes: &[u8] = other.as_ref();
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Run the command loop until LOGOUT or EOF.
async fn handle_imap_session<S: AsyncRead + AsyncWrite + Unpin>(
    mut reader: BufReader<S>,
    mailbox: &Mailbox,
    stats: &Stats,
) {
    let mut selected_folder: Option<String> = None;
    let codec = CommandCodec::default();

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let trimmed = line.trim();
        let mut words = trimmed.split_whitespace();
        let Some(tag) = words.next() else {
            continue;
        };
        let verb = words.next().unwrap_or_default().to_ascii_uppercase();

        match verb.as_str() {
            "ID" => {
                stats.id_commands.fetch_add(1, Ordering::SeqCst);
                handle_id(tag, mailbox.reject_id, &mut reader).await;
                continue;
            }
            "LOGIN" => {
                stats.logins.fetch_add(1, Ordering::SeqCst);
                let accepted =
                    parse_login_args(trimmed).is_some_and(|(user, pass)| mailbox.accepts(&user, &pass));
                if !handle_login(tag, accepted, &mut reader).await {
                    break;
                }
                continue;
            }
            _ => {}
        }

        let Ok((_, command)) = codec.decode(line.as_bytes()) else {
            if write_line(&mut reader, &format!("{tag} BAD Parse error\r\n"))
                .await
                .is_err()
            {
                break;
            }
            continue;
        };

        let tag = command.tag.inner();

        match command.body {
            CommandBody::List { .. } => {
                handle_list(tag, mailbox, &mut reader).await;
            }
            CommandBody::Select { mailbox: mb, .. } => {
                let name = mailbox_name(&mb);
                let flaky = mailbox.flaky_select.as_deref() == Some(name.as_str())
                    && !stats.flaky_select_tripped.swap(true, Ordering::SeqCst);
                selected_folder = if flaky {
                    let _ = write_line(&mut reader, &format!("{tag} NO Try again later\r\n")).await;
                    None
                } else {
                    handle_select(tag, &name, mailbox, &mut reader).await
                };
            }
            CommandBody::Search { uid: true, .. } => {
                handle_uid_search(tag, mailbox, selected_folder.as_deref(), &mut reader).await;
            }
            CommandBody::Fetch {
                sequence_set,
                uid: true,
                ..
            } => {
                let header_only = trimmed.to_ascii_uppercase().contains("BODY.PEEK[HEADER]");
                handle_uid_fetch(
                    tag,
                    &sequence_set,
                    header_only,
                    mailbox,
                    selected_folder.as_deref(),
                    &mut reader,
                )
                .await;
            }
            CommandBody::Logout => {
                handle_logout(tag, &mut reader).await;
                break;
            }
            _ => {
                if write_line(&mut reader, &format!("{tag} BAD Unknown command\r\n"))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    }
}
