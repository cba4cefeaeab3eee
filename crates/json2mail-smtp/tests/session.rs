//! Session tests against a scripted SMTP server on the loopback interface.
//!
//! The server speaks just enough SMTP to drive the client through setup,
//! transactions and QUIT, and records every line it receives.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use json2mail_smtp::connection::connect;
use json2mail_smtp::{Address, Client, Envelope, Error, StartTlsPolicy};

struct FakeServer {
    port: u16,
    transcript: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl FakeServer {
    /// Starts a server advertising `keywords` in its EHLO reply and
    /// answering 550 to `RCPT TO` for every address in `reject`.
    async fn start(keywords: &'static [&'static str], reject: &'static [&'static str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let transcript = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&transcript);

        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();

            write.write_all(b"220 fake.test ESMTP\r\n").await.unwrap();

            let mut login_step = 0;
            while let Some(line) = lines.next_line().await.unwrap() {
                log.lock().unwrap().push(line.clone());
                let upper = line.to_ascii_uppercase();

                let reply = if login_step > 0 {
                    login_step += 1;
                    if login_step == 2 {
                        "334 UGFzc3dvcmQ6\r\n".to_string()
                    } else {
                        login_step = 0;
                        "235 2.7.0 Authentication successful\r\n".to_string()
                    }
                } else if upper.starts_with("EHLO") {
                    ehlo_reply(keywords)
                } else if upper.starts_with("AUTH PLAIN") {
                    "235 2.7.0 Authentication successful\r\n".to_string()
                } else if upper.starts_with("AUTH LOGIN") {
                    login_step = 1;
                    "334 VXNlcm5hbWU6\r\n".to_string()
                } else if upper.starts_with("RCPT TO:") {
                    let rejected = reject.iter().any(|addr| line.contains(addr));
                    if rejected {
                        "550 5.1.1 No such user\r\n".to_string()
                    } else {
                        "250 2.1.5 Ok\r\n".to_string()
                    }
                } else if upper.starts_with("DATA") {
                    write.write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n").await.unwrap();
                    while let Some(data) = lines.next_line().await.unwrap() {
                        let done = data == ".";
                        log.lock().unwrap().push(data);
                        if done {
                            break;
                        }
                    }
                    "250 2.0.0 Ok: queued\r\n".to_string()
                } else if upper.starts_with("QUIT") {
                    write.write_all(b"221 2.0.0 Bye\r\n").await.unwrap();
                    break;
                } else if upper.starts_with("MAIL FROM:")
                    || upper.starts_with("RSET")
                    || upper.starts_with("NOOP")
                {
                    "250 2.0.0 Ok\r\n".to_string()
                } else {
                    "502 5.5.2 Command not recognized\r\n".to_string()
                };
                write.write_all(reply.as_bytes()).await.unwrap();
            }
        });

        Self {
            port,
            transcript,
            handle,
        }
    }

    async fn finish(self) -> Vec<String> {
        self.handle.await.unwrap();
        self.transcript.lock().unwrap().clone()
    }
}

fn ehlo_reply(keywords: &[&str]) -> String {
    if keywords.is_empty() {
        return "250 fake.test\r\n".to_string();
    }
    let mut reply = String::from("250-fake.test\r\n");
    for (i, keyword) in keywords.iter().enumerate() {
        let sep = if i + 1 == keywords.len() { ' ' } else { '-' };
        reply.push_str(&format!("250{sep}{keyword}\r\n"));
    }
    reply
}

async fn greeted(server: &FakeServer) -> Client<json2mail_smtp::Connected> {
    let stream = connect("127.0.0.1", server.port).await.unwrap();
    Client::from_stream(stream)
        .await
        .unwrap()
        .ehlo("localhost")
        .await
        .unwrap()
}

fn envelope(to: &[&str]) -> Envelope {
    Envelope::new(
        Address::new("sender@example.com").unwrap(),
        to.iter().map(|addr| Address::new(*addr).unwrap()).collect(),
    )
    .unwrap()
}

#[tokio::test]
async fn mandatory_policy_refuses_plain_server() {
    let server = FakeServer::start(&["PIPELINING", "AUTH PLAIN"], &[]).await;
    let client = greeted(&server).await;
    assert_eq!(client.server_info().hostname, "fake.test");

    let err = client
        .secure("127.0.0.1", StartTlsPolicy::Mandatory)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StartTlsUnsupported));
}

#[tokio::test]
async fn opportunistic_policy_continues_without_tls() {
    let server = FakeServer::start(&["AUTH PLAIN LOGIN"], &[]).await;
    let client = greeted(&server)
        .await
        .secure("127.0.0.1", StartTlsPolicy::Opportunistic)
        .await
        .unwrap();

    let client = client.authenticate("user", "secret").await.unwrap();
    client.quit().await.unwrap();

    let transcript = server.finish().await;
    assert_eq!(
        transcript,
        vec!["EHLO localhost", "AUTH PLAIN AHVzZXIAc2VjcmV0", "QUIT"]
    );
}

#[tokio::test]
async fn login_is_used_when_plain_is_not_offered() {
    let server = FakeServer::start(&["AUTH LOGIN"], &[]).await;
    let client = greeted(&server).await.authenticate("user", "secret").await.unwrap();
    client.quit().await.unwrap();

    let transcript = server.finish().await;
    assert_eq!(
        transcript,
        vec!["EHLO localhost", "AUTH LOGIN", "dXNlcg==", "c2VjcmV0", "QUIT"]
    );
}

#[tokio::test]
async fn no_auth_advertised_skips_authentication() {
    let server = FakeServer::start(&[], &[]).await;
    let client = greeted(&server).await.authenticate("user", "secret").await.unwrap();
    client.quit().await.unwrap();

    let transcript = server.finish().await;
    assert!(transcript.iter().all(|line| !line.starts_with("AUTH")));
}

#[tokio::test]
async fn unsupported_mechanisms_are_reported() {
    let server = FakeServer::start(&["AUTH CRAM-MD5"], &[]).await;
    let err = greeted(&server)
        .await
        .authenticate("user", "secret")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoAuthMechanism(ref offered) if offered == "CRAM-MD5"));
}

#[tokio::test]
async fn one_connection_carries_many_transactions() {
    let server = FakeServer::start(&["AUTH PLAIN", "SIZE 100000"], &[]).await;
    let mut client = greeted(&server).await.authenticate("user", "secret").await.unwrap();

    let message = b"Subject: one\r\n\r\nfirst\r\n.dot line\r\n";
    client
        .send(&envelope(&["a@example.com", "b@example.com"]), message)
        .await
        .unwrap();
    client
        .send(&envelope(&["c@example.com"]), b"Subject: two\r\n\r\nsecond\r\n")
        .await
        .unwrap();
    client.quit().await.unwrap();

    let transcript = server.finish().await;
    let ehlo_count = transcript.iter().filter(|l| l.starts_with("EHLO")).count();
    assert_eq!(ehlo_count, 1);

    let mail_from: Vec<_> = transcript
        .iter()
        .filter(|l| l.starts_with("MAIL FROM"))
        .collect();
    assert_eq!(mail_from.len(), 2);
    assert_eq!(
        mail_from[0].as_str(),
        format!("MAIL FROM:<sender@example.com> SIZE={}", message.len())
    );

    assert!(transcript.contains(&"RCPT TO:<b@example.com>".to_string()));
    assert!(transcript.contains(&"..dot line".to_string()));
}

#[tokio::test]
async fn rejected_recipient_resets_and_keeps_session() {
    let server = FakeServer::start(&["AUTH PLAIN"], &["ghost@example.com"]).await;
    let mut client = greeted(&server).await.authenticate("user", "secret").await.unwrap();

    let err = client
        .send(&envelope(&["ghost@example.com"]), b"Subject: lost\r\n\r\nx\r\n")
        .await
        .unwrap_err();
    assert!(err.is_permanent());

    client
        .send(&envelope(&["real@example.com"]), b"Subject: ok\r\n\r\ny\r\n")
        .await
        .unwrap();
    client.quit().await.unwrap();

    let transcript = server.finish().await;
    let rcpt = transcript
        .iter()
        .position(|l| l == "RCPT TO:<ghost@example.com>")
        .unwrap();
    assert_eq!(transcript[rcpt + 1], "RSET");
    assert!(transcript.contains(&"RCPT TO:<real@example.com>".to_string()));
}

#[tokio::test]
async fn oversized_message_is_refused_before_mail_from() {
    let server = FakeServer::start(&["SIZE 16"], &[]).await;
    let mut client = greeted(&server).await.ready();

    let err = client
        .send(&envelope(&["a@example.com"]), b"Subject: too long for the limit\r\n\r\n")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MessageTooLarge { limit: 16, .. }));

    client.noop().await.unwrap();
    client.quit().await.unwrap();

    let transcript = server.finish().await;
    assert!(transcript.iter().all(|l| !l.starts_with("MAIL FROM")));
}
