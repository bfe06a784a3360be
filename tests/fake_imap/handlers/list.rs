//! LIST command handler.
//!
//! One `* LIST` line per folder, hierarchy delimiter `/`, then the
//! tagged OK (RFC 3501 Section 7.2.2):
//!
//! ```text
//! * LIST (\HasNoChildren) "/" "INBOX"
//! * LIST (\HasNoChildren \Trash) "/" "Trash"
//! A0002 OK LIST completed
//! ```

use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_list<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) {
    for folder in &mailbox.folders {
        let prefix = format!("{}/", folder.name);
        let has_children = mailbox.folders.iter().any(|f| f.name.starts_with(&prefix));

        let mut attributes = vec![if has_children {
            "\\HasChildren"
        } else {
            "\\HasNoChildren"
        }];
        attributes.extend(folder.attributes.iter().map(String::as_str));

        let line = format!(
            "* LIST ({}) \"/\" \"{}\"\r\n",
            attributes.join(" "),
            folder.name
        );
        if write_line(stream, &line).await.is_err() {
            return;
        }
    }
    let _ = write_line(stream, &format!("{tag} OK LIST completed\r\n")).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::MailboxBuilder;
    use tokio::io::BufReader;

    async fn run(tag: &str, mailbox: &Mailbox) -> String {
        let (client, server) = tokio::io::duplex(4096);
        let mut stream = BufReader::new(server);

        handle_list(tag, mailbox, &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn lists_all_folders() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .folder("Sent")
            .folder("Trash")
            .build();

        let output = run("A1", &mailbox).await;

        assert!(output.contains("\"INBOX\""));
        assert!(output.contains("\"Sent\""));
        assert!(output.contains("\"Trash\""));
        assert!(output.ends_with("A1 OK LIST completed\r\n"));
    }

    #[tokio::test]
    async fn empty_mailbox_returns_only_ok() {
        let mailbox = MailboxBuilder::new().build();
        let output = run("T2", &mailbox).await;

        assert_eq!(output, "T2 OK LIST completed\r\n");
    }

    #[tokio::test]
    async fn parent_folders_have_children() {
        let mailbox = MailboxBuilder::new()
            .folder("Work")
            .folder("Work/Projects")
            .build();
        let output = run("T3", &mailbox).await;

        assert!(output.contains("* LIST (\\HasChildren) \"/\" \"Work\"\r\n"));
        assert!(output.contains("* LIST (\\HasNoChildren) \"/\" \"Work/Projects\"\r\n"));
    }

    #[tokio::test]
    async fn extra_attributes_are_listed() {
        let mailbox = MailboxBuilder::new()
            .folder("Bin")
            .attribute("\\Trash")
            .build();
        let output = run("T4", &mailbox).await;

        assert!(output.contains("(\\HasNoChildren \\Trash)"));
    }
}
