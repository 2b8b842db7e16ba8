//! Render puro del estado de la vista.
//!
//! `render` transforma un `ViewState` inmutable en una descripción del DOM
//! (`Node`); `Node::to_html` y `render_page` son el adaptador que la convierte
//! en HTML para el navegador.

use serde::Serialize;

use crate::models::{ConversationLog, EntryBody, LogEntry, SearchHit};

/// Indicador de búsqueda en curso. Los handlers de formulario esperan al
/// backend antes de redirigir, así que la página sólo lo muestra si se pinta
/// durante la petición (otra pestaña o un sondeo de `/ui/state`).
pub const PENDING_TEXT: &str = "Pensando...";
/// Igual que `PENDING_TEXT`, para la subida de ficheros.
pub const UPLOADING_TEXT: &str = "Subiendo...";

/// Estado de la subida de ficheros tal y como se muestra.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum UploadStatus {
    #[default]
    Idle,
    Pending,
    Success(String),
    Error(String),
}

/// Todo lo que se pinta en la página para una sesión.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewState {
    pub log: ConversationLog,
    /// Indicador "pensando" de la búsqueda en curso. No forma parte del registro.
    pub pending: bool,
    pub upload: UploadStatus,
    pub file_preview: Option<String>,
    /// Último error de validación; se limpia con la siguiente acción.
    pub validation: Option<String>,
}

/// Descripción mínima de un nodo del DOM.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Node {
    Element {
        tag: &'static str,
        id: Option<&'static str>,
        class: Option<String>,
        children: Vec<Node>,
    },
    Text(String),
}

impl Node {
    pub fn el(tag: &'static str) -> Self {
        Node::Element { tag, id: None, class: None, children: Vec::new() }
    }

    pub fn id(mut self, value: &'static str) -> Self {
        if let Node::Element { id, .. } = &mut self {
            *id = Some(value);
        }
        self
    }

    pub fn class(mut self, value: impl Into<String>) -> Self {
        if let Node::Element { class, .. } = &mut self {
            *class = Some(value.into());
        }
        self
    }

    pub fn child(mut self, node: Node) -> Self {
        if let Node::Element { children, .. } = &mut self {
            children.push(node);
        }
        self
    }

    pub fn text(self, value: impl Into<String>) -> Self {
        self.child(Node::Text(value.into()))
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(&escape_html(t)),
            Node::Element { tag, id, class, children } => {
                out.push('<');
                out.push_str(tag);
                if let Some(id) = id {
                    out.push_str(&format!(" id=\"{}\"", escape_html(id)));
                }
                if let Some(class) = class {
                    out.push_str(&format!(" class=\"{}\"", escape_html(class)));
                }
                out.push('>');
                for child in children {
                    child.write_html(out);
                }
                out.push_str(&format!("</{tag}>"));
            }
        }
    }
}

#[cfg(test)]
impl Node {
    /// Busca un elemento por id en el subárbol.
    pub fn find_by_id(&self, wanted: &str) -> Option<&Node> {
        match self {
            Node::Element { id, children, .. } => {
                if *id == Some(wanted) {
                    return Some(self);
                }
                children.iter().find_map(|c| c.find_by_id(wanted))
            }
            Node::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element { children, .. } => children,
            Node::Text(_) => &[],
        }
    }

    /// Texto concatenado del subárbol.
    pub fn text_content(&self) -> String {
        match self {
            Node::Text(t) => t.clone(),
            Node::Element { children, .. } => {
                children.iter().map(Node::text_content).collect::<Vec<_>>().join(" ")
            }
        }
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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

/// Render puro: mismo estado, mismo árbol.
pub fn render(state: &ViewState) -> Vec<Node> {
    let mut nodes = vec![render_log(&state.log, state.pending)];

    if let Some(message) = &state.validation {
        nodes.push(Node::el("div").id("validation-message").class("alert").text(message.clone()));
    }

    let mut file_list = Node::el("div").id("file-list");
    if let Some(preview) = &state.file_preview {
        file_list = file_list.text(preview.clone());
    }
    nodes.push(file_list);
    nodes.push(render_upload_status(&state.upload));

    nodes
}

fn render_log(log: &ConversationLog, pending: bool) -> Node {
    let mut container = Node::el("div").id("conversation-log");
    for entry in log.entries() {
        container = container.child(render_entry(entry));
    }
    if pending {
        container = container.child(
            Node::el("div")
                .id("thinking-message")
                .class("message bot-message")
                .text(PENDING_TEXT),
        );
    }
    container
}

fn render_entry(entry: &LogEntry) -> Node {
    let class = format!("message {}", entry.role.css_class());
    match &entry.body {
        EntryBody::Text { text } => Node::el("div").class(class).text(text.clone()),
        EntryBody::Hit { hit } => render_hit(hit, class),
    }
}

fn render_hit(hit: &SearchHit, class: String) -> Node {
    let mut card = Node::el("div").class(format!("{class} result-card"));
    if let Some(title) = &hit.title {
        card = card.child(Node::el("h3").class("result-title").text(title.clone()));
    }
    card = card.child(Node::el("p").class("result-content").text(hit.content.clone()));

    let mut meta = Node::el("div").class("result-meta")
        .child(Node::el("span").class("result-similarity").text(format!("Similitud: {}", hit.similarity_label())))
        .child(Node::el("span").class("result-source").text(format!("Fuente: {}", hit.source)));
    if let Some(authors) = &hit.authors {
        meta = meta.child(Node::el("span").class("result-authors").text(format!("Autores: {authors}")));
    }
    if let Some(date) = &hit.publication_date {
        meta = meta.child(Node::el("span").class("result-date").text(format!("Fecha: {date}")));
    }
    card.child(meta)
}

fn render_upload_status(status: &UploadStatus) -> Node {
    let node = Node::el("div").id("upload-status");
    match status {
        UploadStatus::Idle => node,
        UploadStatus::Pending => node.class("status-message").text(UPLOADING_TEXT),
        UploadStatus::Success(msg) => node.class("status-message success").text(format!("Éxito: {msg}")),
        UploadStatus::Error(msg) => node.class("status-message error").text(format!("Error: {msg}")),
    }
}

/// Página completa: formulario estático + nodos renderizados del estado.
pub fn render_page(state: &ViewState) -> String {
    let body: String = render(state).iter().map(Node::to_html).collect();
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="utf-8">
<title>SARA</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<main class="container">
<h1>SARA</h1>
<section class="search">
<form method="post" action="/ui/search">
<input id="query-input" name="query" type="text" placeholder="Escribe tu pregunta..." autofocus>
<button id="send-button" type="submit">Enviar</button>
</form>
</section>
<section class="upload">
<form method="post" action="/ui/upload" enctype="multipart/form-data">
<input id="file-input" name="files" type="file" multiple>
<button id="upload-button" type="submit">Subir</button>
</form>
</section>
{body}
</main>
</body>
</html>
"#
    )
}
