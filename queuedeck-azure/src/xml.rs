//! XML bodies exchanged with the queue service

use chrono::{DateTime, Utc};
use queuedeck_core::{PopReceipt, QueueError, QueueMessage, ReceivedMessage};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

/// `ListQueues` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    #[serde(default)]
    queues: QueueList,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct QueueList {
    #[serde(rename = "Queue", default)]
    queue: Vec<QueueEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueueEntry {
    name: String,
}

/// Messages returned by peek, receive, and put
#[derive(Debug, Default, Deserialize)]
struct QueueMessagesList {
    #[serde(rename = "QueueMessage", default)]
    messages: Vec<QueueMessageXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueueMessageXml {
    message_id: String,
    #[serde(default)]
    insertion_time: Option<String>,
    #[serde(default)]
    expiration_time: Option<String>,
    #[serde(default)]
    pop_receipt: Option<String>,
    #[serde(default)]
    time_next_visible: Option<String>,
    #[serde(default)]
    dequeue_count: u32,
    #[serde(default)]
    message_text: String,
}

impl QueueMessageXml {
    fn into_message(self) -> QueueMessage {
        QueueMessage {
            id: self.message_id,
            content: self.message_text,
            insertion_time: parse_time(self.insertion_time.as_deref()),
            expiration_time: parse_time(self.expiration_time.as_deref()),
            dequeue_count: self.dequeue_count,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// One page of queue names plus the marker for the next page, if any
#[derive(Debug, PartialEq, Eq)]
pub struct QueuePage {
    pub names: Vec<String>,
    pub next_marker: Option<String>,
}

pub fn parse_queue_page(body: &str) -> Result<QueuePage, QueueError> {
    let results: EnumerationResults = from_str(body)?;
    Ok(QueuePage {
        names: results.queues.queue.into_iter().map(|q| q.name).collect(),
        next_marker: results.next_marker.filter(|m| !m.trim().is_empty()),
    })
}

/// Decode a message list, keeping each `MessageText` exactly as sent.
///
/// The serde deserializer trims text nodes, so message bodies are taken from
/// a separate reader pass that leaves whitespace alone.
fn decode_messages(body: &str) -> Result<Vec<QueueMessageXml>, QueueError> {
    let list: QueueMessagesList = from_str(body)?;
    let texts = message_texts(body)?;
    if texts.len() != list.messages.len() {
        return Err(QueueError::InvalidResponse(format!(
            "expected {} message bodies, found {}",
            list.messages.len(),
            texts.len()
        )));
    }

    Ok(list
        .messages
        .into_iter()
        .zip(texts)
        .map(|(mut message, text)| {
            message.message_text = text;
            message
        })
        .collect())
}

/// Untrimmed `MessageText` of every `QueueMessage`, in document order
fn message_texts(body: &str) -> Result<Vec<String>, QueueError> {
    let invalid = |e: quick_xml::Error| QueueError::InvalidResponse(e.to_string());

    let mut reader = Reader::from_str(body);
    reader.trim_text(false);

    let mut texts: Vec<String> = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event().map_err(invalid)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"QueueMessage" => texts.push(String::new()),
                b"MessageText" => in_text = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"QueueMessage" => {
                texts.push(String::new());
            }
            Event::End(e) if e.local_name().as_ref() == b"MessageText" => in_text = false,
            Event::Text(t) if in_text => {
                let text = t.unescape().map_err(invalid)?;
                if let Some(current) = texts.last_mut() {
                    current.push_str(&text);
                }
            }
            Event::CData(c) if in_text => {
                if let Some(current) = texts.last_mut() {
                    current.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(texts)
}

/// Parse a peek response
pub fn parse_peeked(body: &str) -> Result<Vec<QueueMessage>, QueueError> {
    Ok(decode_messages(body)?
        .into_iter()
        .map(QueueMessageXml::into_message)
        .collect())
}

/// Parse a receive response; every message must carry a pop receipt
pub fn parse_received(body: &str) -> Result<Vec<ReceivedMessage>, QueueError> {
    decode_messages(body)?
        .into_iter()
        .map(|m| {
            let receipt = m.pop_receipt.clone().ok_or_else(|| {
                QueueError::InvalidResponse(format!("message {} has no PopReceipt", m.message_id))
            })?;
            let time_next_visible = parse_time(m.time_next_visible.as_deref());
            Ok(ReceivedMessage::new(
                m.into_message(),
                PopReceipt::new(receipt),
                time_next_visible,
            ))
        })
        .collect()
}

/// Parse a put-message response into the stored message
pub fn parse_sent(body: &str, text: &str) -> Result<QueueMessage, QueueError> {
    let list: QueueMessagesList = from_str(body)?;
    let sent = list
        .messages
        .into_iter()
        .next()
        .ok_or_else(|| QueueError::InvalidResponse("PutMessage returned no message".to_string()))?;

    let mut message = sent.into_message();
    message.content = text.to_string();
    Ok(message)
}

/// Code and first message line of an `<Error>` body, if it has one
pub fn parse_error(body: &str) -> (Option<String>, Option<String>) {
    let error: ErrorBody = quick_xml::de::from_str(body).unwrap_or_default();
    let message = error
        .message
        .and_then(|m| m.lines().next().map(str::to_string));
    (error.code, message)
}

/// Request body for PutMessage
pub fn format_put_message(text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?><QueueMessage><MessageText>{}</MessageText></QueueMessage>",
        escape_xml(text)
    )
}

fn from_str<'de, T: Deserialize<'de>>(body: &'de str) -> Result<T, QueueError> {
    quick_xml::de::from_str(body).map_err(|e| QueueError::InvalidResponse(e.to_string()))
}

fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEEK_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<QueueMessagesList>
  <QueueMessage>
    <MessageId>5974b586-0df3-4e2d-ad0c-18e3892bfca2</MessageId>
    <InsertionTime>Fri, 09 Oct 2009 21:04:30 GMT</InsertionTime>
    <ExpirationTime>Fri, 16 Oct 2009 21:04:30 GMT</ExpirationTime>
    <DequeueCount>1</DequeueCount>
    <MessageText>hello &amp; goodbye</MessageText>
  </QueueMessage>
  <QueueMessage>
    <MessageId>b7a1c2d3-0000-4e2d-ad0c-18e3892bfca2</MessageId>
    <InsertionTime>Fri, 09 Oct 2009 21:05:30 GMT</InsertionTime>
    <ExpirationTime>Fri, 16 Oct 2009 21:05:30 GMT</ExpirationTime>
    <DequeueCount>0</DequeueCount>
    <MessageText>second</MessageText>
  </QueueMessage>
</QueueMessagesList>"#;

    #[test]
    fn test_parse_peeked() {
        let messages = parse_peeked(PEEK_BODY).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "5974b586-0df3-4e2d-ad0c-18e3892bfca2");
        assert_eq!(messages[0].content, "hello & goodbye");
        assert_eq!(messages[0].dequeue_count, 1);
        assert_eq!(
            messages[0].insertion_time.unwrap().to_rfc3339(),
            "2009-10-09T21:04:30+00:00"
        );
        assert_eq!(messages[1].content, "second");
    }

    #[test]
    fn test_message_text_keeps_whitespace() {
        for text in ["  padded text \n", "   ", "\n\tline one\nline two\n"] {
            let body = format!(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<QueueMessagesList>\n  <QueueMessage>\n    <MessageId>id-1</MessageId>\n    <PopReceipt>r-1</PopReceipt>\n    <DequeueCount>0</DequeueCount>\n    <MessageText>{}</MessageText>\n  </QueueMessage>\n</QueueMessagesList>",
                escape_xml(text)
            );

            assert_eq!(parse_peeked(&body).unwrap()[0].content, text);
            assert_eq!(parse_received(&body).unwrap()[0].content(), text);
        }
    }

    #[test]
    fn test_message_text_per_message() {
        let body = "<QueueMessagesList><QueueMessage><MessageId>a</MessageId><MessageText> first </MessageText></QueueMessage><QueueMessage><MessageId>b</MessageId><MessageText /></QueueMessage><QueueMessage><MessageId>c</MessageId><MessageText>&lt;third&gt; </MessageText></QueueMessage></QueueMessagesList>";
        let contents: Vec<String> = parse_peeked(body)
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec![" first ", "", "<third> "]);
    }

    #[test]
    fn test_parse_empty_list() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?><QueueMessagesList />"#;
        assert!(parse_peeked(body).unwrap().is_empty());
        assert!(parse_received(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_received_requires_receipt() {
        let body = r#"<QueueMessagesList>
  <QueueMessage>
    <MessageId>id-1</MessageId>
    <PopReceipt>AgAAAAMAAAAAAAAA</PopReceipt>
    <TimeNextVisible>Fri, 09 Oct 2009 23:29:20 GMT</TimeNextVisible>
    <DequeueCount>1</DequeueCount>
    <MessageText>body</MessageText>
  </QueueMessage>
</QueueMessagesList>"#;
        let received = parse_received(body).unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].id(), "id-1");
        assert_eq!(received[0].pop_receipt().as_str(), "AgAAAAMAAAAAAAAA");
        assert!(received[0].time_next_visible().is_some());

        assert!(matches!(
            parse_received(PEEK_BODY),
            Err(QueueError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_queue_page() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://myaccount.queue.core.windows.net/">
  <Prefix></Prefix>
  <MaxResults>5000</MaxResults>
  <Queues>
    <Queue><Name>alpha</Name></Queue>
    <Queue><Name>beta</Name></Queue>
  </Queues>
  <NextMarker>/myaccount/gamma</NextMarker>
</EnumerationResults>"#;
        let page = parse_queue_page(body).unwrap();
        assert_eq!(page.names, vec!["alpha", "beta"]);
        assert_eq!(page.next_marker.as_deref(), Some("/myaccount/gamma"));

        let last = r#"<EnumerationResults><Queues><Queue><Name>gamma</Name></Queue></Queues><NextMarker /></EnumerationResults>"#;
        let page = parse_queue_page(last).unwrap();
        assert_eq!(page.names, vec!["gamma"]);
        assert_eq!(page.next_marker, None);
    }

    #[test]
    fn test_parse_error() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?><Error><Code>QueueNotFound</Code><Message>The specified queue does not exist.
RequestId:8a2b
Time:2024-01-01T00:00:00.0000000Z</Message></Error>"#;
        let (code, message) = parse_error(body);
        assert_eq!(code.as_deref(), Some("QueueNotFound"));
        assert_eq!(message.as_deref(), Some("The specified queue does not exist."));

        assert_eq!(parse_error(""), (None, None));
    }

    #[test]
    fn test_put_message_body_escapes_text() {
        let body = format_put_message("<b>\"hi\" & 'bye'</b>");
        assert!(body.contains(
            "<MessageText>&lt;b&gt;&quot;hi&quot; &amp; &apos;bye&apos;&lt;/b&gt;</MessageText>"
        ));
    }
}
