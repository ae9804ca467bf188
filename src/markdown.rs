use pulldown_cmark::escape::{escape_href, escape_html};
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag};
use std::collections::HashSet;

/// An article body converted to HTML along with its table of contents.
#[derive(Debug, Default)]
pub struct RenderedMarkdown {
    pub html: String,
    pub toc: String,
}

#[derive(Debug)]
struct TocNode {
    level: u8,
    id: String,
    name: String,
    children: Vec<TocNode>,
}

/// Hands out heading ids, suffixing repeats with `_1`, `_2`, ...
#[derive(Default)]
struct HeadingIds(HashSet<String>);

impl HeadingIds {
    fn unique(&mut self, text: &str) -> String {
        let mut base = slug::slugify(text);
        if base.is_empty() {
            base = "_".to_owned();
        }

        let mut id = base.to_owned();
        let mut n = 1;
        while self.0.contains(&id) {
            id = format!("{}_{}", base, n);
            n += 1;
        }
        self.0.insert(id.to_owned());
        id
    }
}

/// Converts markdown to HTML.
/// Tables, footnotes and strikethrough are enabled. Headings receive anchor ids
/// which the table of contents links to. Fenced code is wrapped for highlighting.
pub fn render(input: &str) -> RenderedMarkdown {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let events: Vec<Event> = Parser::new_ext(input, options).collect();
    let mut output: Vec<Event> = Vec::with_capacity(events.len());
    let mut ids = HeadingIds::default();
    let mut toc: Vec<TocNode> = Vec::new();

    for (pos, event) in events.iter().enumerate() {
        match event {
            Event::Start(Tag::Heading(level, _, _)) => {
                let name = heading_text(&events[pos + 1..]);
                let id = ids.unique(&name);
                let tag = heading_tag(*level);

                output.push(Event::Html(CowStr::from(format!(
                    "<{} id=\"{}\">",
                    tag,
                    escape(&id)
                ))));
                insert_toc_node(
                    &mut toc,
                    TocNode {
                        level: tag[1..].parse().unwrap_or(1),
                        id,
                        name,
                        children: Vec::new(),
                    },
                );
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(|lang| {
                            lang.chars()
                                .filter(|c| c.is_ascii_alphanumeric() || "+-_#.".contains(*c))
                                .collect::<String>()
                        })
                        .filter(|lang| !lang.is_empty()),
                    CodeBlockKind::Indented => None,
                };
                let open = match lang {
                    Some(lang) => format!(
                        "<div class=\"codehilite\"><pre><code class=\"language-{}\">",
                        lang
                    ),
                    None => "<div class=\"codehilite\"><pre><code>".to_owned(),
                };
                output.push(Event::Html(CowStr::from(open)));
            }
            Event::End(Tag::CodeBlock(_)) => {
                output.push(event.to_owned());
                output.push(Event::Html(CowStr::Borrowed("</div>\n")));
            }
            _ => output.push(event.to_owned()),
        }
    }

    let mut body = String::with_capacity(input.len() * 3 / 2);
    html::push_html(&mut body, output.into_iter());

    RenderedMarkdown {
        html: body,
        toc: render_toc(&toc),
    }
}

/// Plain text of the heading starting right after its opening event.
fn heading_text(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::End(Tag::Heading(..)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    text
}

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}

/// Deeper headings nest under the closest shallower heading before them.
fn insert_toc_node(nodes: &mut Vec<TocNode>, node: TocNode) {
    let nest = nodes.last().map_or(false, |last| last.level < node.level);
    if nest {
        if let Some(last) = nodes.last_mut() {
            insert_toc_node(&mut last.children, node);
        }
    } else {
        nodes.push(node);
    }
}

fn render_toc(nodes: &[TocNode]) -> String {
    let mut buffer = String::from("<div class=\"toc\">\n");
    render_toc_list(&mut buffer, nodes);
    buffer.push_str("</div>\n");
    buffer
}

fn render_toc_list(buffer: &mut String, nodes: &[TocNode]) {
    buffer.push_str("<ul>\n");
    for node in nodes {
        let mut href = String::new();
        let _ = escape_href(&mut href, &node.id);

        buffer.push_str(&format!("<li><a href=\"#{}\">{}</a>", href, escape(&node.name)));
        if !node.children.is_empty() {
            buffer.push('\n');
            render_toc_list(buffer, &node.children);
        }
        buffer.push_str("</li>\n");
    }
    buffer.push_str("</ul>\n");
}

fn escape(text: &str) -> String {
    let mut buffer = String::with_capacity(text.len());
    let _ = escape_html(&mut buffer, text);
    buffer
}

#[cfg(test)]
mod tests {
    use super::render;

    #[test]
    fn headings_get_ids_and_toc() {
        let out = render("# Intro\n\ntext\n\n## Setup *fast*\n\n## Setup fast\n");
        assert!(out.html.contains("<h1 id=\"intro\">Intro</h1>"));
        assert!(out.html.contains("<h2 id=\"setup-fast\">Setup <em>fast</em></h2>"));
        assert!(out.html.contains("<h2 id=\"setup-fast_1\">Setup fast</h2>"));

        assert!(out.toc.starts_with("<div class=\"toc\">"));
        assert!(out.toc.contains("<li><a href=\"#intro\">Intro</a>\n<ul>\n"));
        assert!(out.toc.contains("<li><a href=\"#setup-fast_1\">Setup fast</a></li>"));
    }

    #[test]
    fn toc_nests_skipped_levels() {
        let out = render("# A\n### B\n## C\n# D\n");
        assert_eq!(
            out.toc,
            "<div class=\"toc\">\n<ul>\n\
             <li><a href=\"#a\">A</a>\n<ul>\n\
             <li><a href=\"#b\">B</a></li>\n\
             <li><a href=\"#c\">C</a></li>\n\
             </ul>\n</li>\n\
             <li><a href=\"#d\">D</a></li>\n\
             </ul>\n</div>\n"
        );
    }

    #[test]
    fn empty_document_has_empty_toc() {
        let out = render("");
        assert_eq!(out.html, "");
        assert_eq!(out.toc, "<div class=\"toc\">\n<ul>\n</ul>\n</div>\n");
    }

    #[test]
    fn fenced_code_is_wrapped_for_highlighting() {
        let out = render("```rust\nfn main() {}\n```\n");
        assert_eq!(
            out.html,
            "<div class=\"codehilite\"><pre><code class=\"language-rust\">fn main() {}\n</code></pre>\n</div>\n"
        );
    }

    #[test]
    fn tables_and_strikethrough() {
        let out = render("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~\n");
        assert!(out.html.contains("<table>"));
        assert!(out.html.contains("<td>1</td>"));
        assert!(out.html.contains("<del>gone</del>"));
    }

    #[test]
    fn heading_text_is_escaped() {
        let out = render("# a < b\n");
        assert!(out.html.contains(">a &lt; b</h1>"));
        assert!(out.toc.contains(">a &lt; b</a>"));
    }
}
