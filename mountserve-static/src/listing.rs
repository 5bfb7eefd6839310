//! Minimal HTML directory listing

use crate::fs::FileInfo;
use std::fmt::Write;

/// Escape text for HTML element and attribute content
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

/// Directories first, then by name
pub fn sort_entries(entries: &mut [FileInfo]) {
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
}

/// Render a listing for `url_path`, which must end with `/`
pub fn render(url_path: &str, mut entries: Vec<FileInfo>) -> String {
    sort_entries(&mut entries);

    let title = escape_html(url_path);
    let mut html = format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Index of {title}</title></head>\
         <body><h1>Index of {title}</h1><hr><pre>\n"
    );

    if url_path != "/" {
        html.push_str("<a href=\"../\">../</a>\n");
    }

    for entry in &entries {
        let suffix = if entry.is_dir { "/" } else { "" };
        let href = urlencoding::encode(&entry.name);
        let label = escape_html(&entry.name);
        let size = if entry.is_dir {
            "-".to_string()
        } else {
            entry.size.to_string()
        };
        let modified = entry
            .mod_time
            .map(httpdate::fmt_http_date)
            .unwrap_or_default();
        let _ = writeln!(
            html,
            "<a href=\"{href}{suffix}\">{label}{suffix}</a>  {modified}  {size}"
        );
    }

    html.push_str("</pre><hr></body></html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, is_dir: bool) -> FileInfo {
        FileInfo {
            name: name.to_string(),
            size: 3,
            is_dir,
            mod_time: None,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_directories_sorted_first() {
        let mut entries = vec![info("b.txt", false), info("z", true), info("a.txt", false), info("c", true)];
        sort_entries(&mut entries);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["c", "z", "a.txt", "b.txt"]);
    }

    #[test]
    fn test_render_escapes_names() {
        let html = render("/media/", vec![info("<script>.txt", false), info("my dir", true)]);
        assert!(html.contains("&lt;script&gt;.txt"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("href=\"my%20dir/\""));
        assert!(html.contains("href=\"../\""));
        assert!(html.find("my dir/").unwrap() < html.find("&lt;script").unwrap());
    }

    #[test]
    fn test_root_has_no_parent_link() {
        let html = render("/", vec![]);
        assert!(!html.contains("../"));
    }
}
