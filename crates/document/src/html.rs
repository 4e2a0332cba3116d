use crate::node::{NodeId, NodeKind};
use crate::Document;

pub(crate) fn render(doc: &Document) -> String {
    let mut out = String::new();
    for child in doc.children(doc.root()) {
        write_node(doc, *child, &mut out);
    }
    out
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match doc.kind(id) {
        Some(NodeKind::Text(text)) => escape_into(text, out),
        Some(NodeKind::Element { tag }) => {
            out.push('<');
            out.push_str(tag);
            out.push('>');
            for child in doc.children(id) {
                write_node(doc, *child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        Some(NodeKind::Highlight(kind)) => {
            out.push_str("<mark class=\"");
            out.push_str(kind.class_name());
            out.push_str("\">");
            for child in doc.children(id) {
                write_node(doc, *child, out);
            }
            out.push_str("</mark>");
        }
        None => {}
    }
}

fn escape_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Document, HighlightKind};

    #[test]
    fn escapes_markup_characters() {
        let doc = Document::from_plain_text("a < b & \"c\"");
        assert_eq!(doc.to_html(), "<p>a &lt; b &amp; &quot;c&quot;</p>");
    }

    #[test]
    fn markers_render_with_their_role() {
        let mut doc = Document::from_plain_text("one two");
        let leaf = doc.text_leaves()[0].id;
        doc.wrap_range(leaf, 4, 7, HighlightKind::Other).unwrap();
        doc.wrap_range(leaf, 0, 3, HighlightKind::Current).unwrap();
        assert_eq!(
            doc.to_html(),
            "<p><mark class=\"search-highlight current\">one</mark> \
             <mark class=\"search-highlight\">two</mark></p>"
        );
    }
}
