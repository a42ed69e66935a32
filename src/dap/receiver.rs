use super::framer;
use crate::error::Error;
use std::io::{self, BufReader, Read};
use std::sync::mpsc::{channel, Receiver};
use std::thread::{self, JoinHandle};

/// What the receiver thread hands over to the session.
#[derive(Debug)]
pub enum Incoming {
    /// One framed payload, still undecoded.
    Payload(Vec<u8>),
    /// The stream could not be read any more. Always the last item.
    Failed(Error),
}

pub type Inbox = Receiver<Incoming>;

/// Spawn the reader loop over the debugger's output stream.
///
/// The loop stops on stream end (dropping the sender, so the inbox reports
/// disconnection) or after pushing a single `Incoming::Failed`.
pub fn spawn<R: Read + Send + 'static>(stream: R) -> io::Result<(JoinHandle<()>, Inbox)> {
    let (tx, rx) = channel();

    let handle = thread::Builder::new()
        .name("dap-receiver".to_string())
        .spawn(move || {
            let mut reader = BufReader::new(stream);
            let mut count = 0u64;
            loop {
                match framer::decode_next(&mut reader) {
                    Ok(Some(payload)) => {
                        count += 1;
                        if tx.send(Incoming::Payload(payload)).is_err() {
                            log::debug!("session dropped its inbox, receiver exiting");
                            break;
                        }
                    }
                    Ok(None) => {
                        log::info!("debugger output closed after {count} messages");
                        break;
                    }
                    Err(e) => {
                        log::error!("receiver stopped: {e}");
                        let _ = tx.send(Incoming::Failed(e));
                        break;
                    }
                }
            }
        })?;

    Ok((handle, rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::io::Cursor;

    #[test]
    fn delivers_payloads_in_order_then_disconnects() {
        let mut bytes = framer::encode(&json!({"seq": 1})).unwrap();
        bytes.extend(framer::encode(&json!({"seq": 2})).unwrap());

        let (handle, inbox) = spawn(Cursor::new(bytes)).unwrap();
        handle.join().unwrap();

        let seqs: Vec<u64> = inbox
            .iter()
            .map(|item| match item {
                Incoming::Payload(p) => serde_json::from_slice::<Value>(&p).unwrap()["seq"]
                    .as_u64()
                    .unwrap(),
                Incoming::Failed(e) => panic!("unexpected failure {e}"),
            })
            .collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn framing_error_is_last_item() {
        let mut bytes = framer::encode(&json!({"seq": 1})).unwrap();
        bytes.extend_from_slice(b"garbage\r\n\r\n{}");

        let (handle, inbox) = spawn(Cursor::new(bytes)).unwrap();
        handle.join().unwrap();

        let items: Vec<Incoming> = inbox.iter().collect();
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Incoming::Payload(_)));
        assert!(matches!(items[1], Incoming::Failed(Error::Framing(_))));
    }
}
