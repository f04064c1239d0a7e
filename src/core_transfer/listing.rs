use crate::core_storage::StoredObject;
use crate::core_transfer::{open_data, rollback_quietly, TransferError};
use crate::helpers::{send_reply, write_fully, ControlWriter};
use crate::server::ServerState;
use crate::session::{ListOptions, Session, SessionStatus};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    List,
    Nlst,
    Stat,
}

/// LIST, NLST and STAT with arguments: sends one line per stored object over
/// the data connection.
pub async fn list(
    writer: &ControlWriter,
    state: &ServerState,
    session: &mut Session,
    kind: ListingKind,
    arg: &str,
) -> std::io::Result<()> {
    session.list_options = ListOptions::parse(arg);
    if kind == ListingKind::Stat {
        send_reply(writer, "213-Status follows:").await?;
    }

    if !open_data(writer, session, state.config.control_timeout()).await? {
        return Ok(());
    }
    session.status = SessionStatus::Listing;

    let lines = match collect_lines(state, session, kind).await {
        Ok(lines) => lines,
        Err(e) => {
            warn!("{} listing failed: {}", writer.id(), e);
            session.close_data_connection();
            return send_reply(writer, "425 Can't open data connection.").await;
        }
    };

    let sent = match session.data.stream() {
        Some(stream) => send_lines(stream, lines.as_bytes()).await,
        None => Err(TransferError::NotConnected),
    };
    session.close_data_connection();

    if let Err(e) = sent {
        warn!("{} listing aborted: {}", writer.id(), e);
        return send_reply(writer, "425 Can't open data connection.").await;
    }
    debug!("{} listing sent, {} bytes", writer.id(), lines.len());

    match kind {
        ListingKind::Stat => send_reply(writer, "213 End of status").await,
        _ => send_reply(writer, "226 Transfer complete.").await,
    }
}

async fn collect_lines(
    state: &ServerState,
    session: &Session,
    kind: ListingKind,
) -> Result<String, TransferError> {
    let options = session.list_options;
    let long = kind != ListingKind::Nlst || options.long;

    if options.directory {
        return Ok(directory_line(&session.working_dir, long, options.classify, Utc::now()));
    }

    let mut tx = state.store.begin().await?;
    let objects = match tx.list().await {
        Ok(objects) => objects,
        Err(e) => {
            rollback_quietly(tx).await;
            return Err(e.into());
        }
    };
    tx.commit().await?;

    Ok(objects
        .iter()
        .filter(|object| options.all || object.size > 0)
        .map(|object| {
            if long {
                long_line(object)
            } else {
                name_line(&session.working_dir, &object.name)
            }
        })
        .collect())
}

async fn send_lines(stream: &mut TcpStream, payload: &[u8]) -> Result<(), TransferError> {
    write_fully(stream, payload).await?;
    stream.flush().await?;
    Ok(())
}

fn long_line(object: &StoredObject) -> String {
    format!(
        "-rw-r--r-- 1 user group {} {} {}\r\n",
        object.size,
        object.created_at.format("%b %d %H:%M"),
        object.name
    )
}

fn name_line(working_dir: &str, name: &str) -> String {
    if working_dir.ends_with('/') {
        format!("{}{}\r\n", working_dir, name)
    } else {
        format!("{}/{}\r\n", working_dir, name)
    }
}

fn directory_line(working_dir: &str, long: bool, classify: bool, now: DateTime<Utc>) -> String {
    let suffix = if classify { "/" } else { "" };
    if long {
        format!(
            "drwxr-xr-x 1 user group 0 {} {}{}\r\n",
            now.format("%b %d %H:%M"),
            working_dir,
            suffix
        )
    } else {
        format!("{}{}\r\n", working_dir, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn object(name: &str, size: u64) -> StoredObject {
        StoredObject {
            entry_id: Uuid::new_v4(),
            name: name.to_string(),
            oid: 1,
            size,
            created_at: Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 0).unwrap(),
        }
    }

    #[test]
    fn test_long_line_format() {
        assert_eq!(
            long_line(&object("report.txt", 1024)),
            "-rw-r--r-- 1 user group 1024 Mar 07 09:05 report.txt\r\n"
        );
    }

    #[test]
    fn test_name_line_is_prefixed_with_the_working_dir() {
        assert_eq!(name_line("/", "a.bin"), "/a.bin\r\n");
        assert_eq!(name_line("/docs", "a.bin"), "/docs/a.bin\r\n");
    }

    #[test]
    fn test_directory_line_with_classify() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap();
        assert_eq!(directory_line("/docs", false, true, now), "/docs/\r\n");
        assert_eq!(
            directory_line("/", true, false, now),
            "drwxr-xr-x 1 user group 0 Jan 02 03:04 /\r\n"
        );
    }
}
