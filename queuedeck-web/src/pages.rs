//! HTML rendering for the console pages

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use queuedeck_core::QueueMessage;

use crate::session::Flash;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 2rem auto; max-width: 960px; color: #222; }
h1 { font-size: 1.5rem; }
nav a { margin-right: 1rem; }
.flash { padding: .5rem 1rem; margin: .5rem 0; border-radius: 4px; }
.flash.success { background: #e6f4ea; color: #1e4620; }
.flash.error { background: #fce8e6; color: #5f2120; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border-bottom: 1px solid #ddd; padding: .4rem; text-align: left; vertical-align: top; }
td.content { white-space: pre-wrap; word-break: break-word; }
td.id { font-family: monospace; font-size: .85rem; }
form { margin: 1rem 0; }
textarea { width: 100%; min-height: 4rem; }
#message { white-space: pre-wrap; border: 1px solid #ddd; padding: 1rem; min-height: 3rem; }
"#;

/// Escape text for use in HTML element content and quoted attributes
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Link that deletes a message by id
pub fn delete_href(message_id: &str) -> String {
    format!("/delete/{}", utf8_percent_encode(message_id, NON_ALPHANUMERIC))
}

/// Everything the list view renders
#[derive(Debug)]
pub struct IndexView<'a> {
    pub current_queue: &'a str,
    pub queues: &'a [String],
    pub messages: &'a [QueueMessage],
    pub flashes: &'a [Flash],
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>{STYLE}</style>
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape_html(title),
    )
}

fn render_flashes(flashes: &[Flash]) -> String {
    flashes
        .iter()
        .map(|f| {
            format!(
                r#"<div class="flash {}">{}</div>"#,
                f.category.as_str(),
                escape_html(&f.message)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_rows(messages: &[QueueMessage]) -> String {
    if messages.is_empty() {
        return r#"<tr><td colspan="3">No messages</td></tr>"#.to_string();
    }

    messages
        .iter()
        .map(|m| {
            format!(
                r#"<tr><td class="id">{id}</td><td class="content">{content}</td><td><a href="{href}">Delete</a></td></tr>"#,
                id = escape_html(&m.id),
                content = escape_html(&m.content),
                href = escape_html(&delete_href(&m.id)),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn index_page(view: &IndexView<'_>) -> String {
    let options = view
        .queues
        .iter()
        .map(|q| format!(r#"<option value="{}">"#, escape_html(q)))
        .collect::<String>();

    let body = format!(
        r#"<h1>Queue: <span id="current-queue">{queue}</span></h1>
<nav><a href="/">Messages</a><a href="/read">Read one by one</a></nav>
{flashes}
<form method="post" action="/change_queue">
  <input name="queue_name" list="queues" placeholder="Queue name" required>
  <datalist id="queues">{options}</datalist>
  <button type="submit">Switch queue</button>
</form>
<form method="post" action="/add">
  <textarea name="message" placeholder="Message text"></textarea>
  <button type="submit">Add message</button>
</form>
<table>
  <thead><tr><th>ID</th><th>Content</th><th></th></tr></thead>
  <tbody id="messages">
{rows}
  </tbody>
</table>
<script>
async function refreshMessages() {{
  const response = await fetch('/refresh');
  const data = await response.json();
  if (!response.ok || !data.messages) return;
  const tbody = document.getElementById('messages');
  tbody.replaceChildren();
  if (data.messages.length === 0) {{
    const row = tbody.insertRow();
    const cell = row.insertCell();
    cell.colSpan = 3;
    cell.textContent = 'No messages';
    return;
  }}
  for (const message of data.messages) {{
    const row = tbody.insertRow();
    const id = row.insertCell();
    id.className = 'id';
    id.textContent = message.id;
    const content = row.insertCell();
    content.className = 'content';
    content.textContent = message.content;
    const link = document.createElement('a');
    link.href = '/delete/' + encodeURIComponent(message.id);
    link.textContent = 'Delete';
    row.insertCell().appendChild(link);
  }}
}}
setInterval(() => refreshMessages().catch(() => {{}}), 5000);
</script>"#,
        queue = escape_html(view.current_queue),
        flashes = render_flashes(view.flashes),
        rows = render_rows(view.messages),
    );

    layout(&format!("Queue {}", view.current_queue), &body)
}

pub fn read_page() -> String {
    let body = r#"<h1>Read messages</h1>
<nav><a href="/">Messages</a><a href="/read">Read one by one</a></nav>
<p>Each read removes the message from the queue.</p>
<button id="next" type="button">Read next</button>
<p id="status"></p>
<div id="message"></div>
<script>
document.getElementById('next').addEventListener('click', async () => {
  const status = document.getElementById('status');
  const box = document.getElementById('message');
  try {
    const response = await fetch('/read/next');
    const data = await response.json();
    if (data.success) {
      status.textContent = 'Message ' + data.message.id;
      box.textContent = data.message.content;
    } else if (data.error) {
      status.textContent = 'Error: ' + data.error;
      box.textContent = '';
    } else {
      status.textContent = data.message;
      box.textContent = '';
    }
  } catch (e) {
    status.textContent = 'Error: ' + e;
  }
});
</script>"#;

    layout("Read messages", body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#39;y&#39;&lt;/script&gt;"
        );
        assert_eq!(escape_html("世界"), "世界");
    }

    #[test]
    fn test_delete_href_encodes_id() {
        assert_eq!(delete_href("abc-123"), "/delete/abc%2D123");
        assert_eq!(delete_href("a/b c"), "/delete/a%2Fb%20c");
    }

    #[test]
    fn test_index_page_escapes_content() {
        let messages = vec![QueueMessage::new("id-1", "<b>bold</b>")];
        let queues = vec!["myqueue".to_string(), "other".to_string()];
        let flashes = vec![Flash::error("Error: <oops>")];

        let html = index_page(&IndexView {
            current_queue: "myqueue",
            queues: &queues,
            messages: &messages,
            flashes: &flashes,
        });

        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(!html.contains("<b>bold</b>"));
        assert!(html.contains(r#"<div class="flash error">Error: &lt;oops&gt;</div>"#));
        assert!(html.contains(r#"<option value="other">"#));
        assert!(html.contains(r#"href="/delete/id%2D1""#));
    }

    #[test]
    fn test_index_page_empty_queue() {
        let html = index_page(&IndexView {
            current_queue: "myqueue",
            queues: &[],
            messages: &[],
            flashes: &[],
        });
        assert!(html.contains("No messages"));
        assert!(!html.contains("class=\"flash"));
    }
}
