//! Minimal Office Open XML package handling.
//!
//! Templates are opaque: only the parts and elements we fill are rewritten,
//! every other zip entry goes back out byte-for-byte in its original order.

pub mod docx;
pub mod xlsx;

use anyhow::{anyhow, Context};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

pub struct Package {
    entries: Vec<(String, Vec<u8>)>,
}

impl Package {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read template {}", path.to_string_lossy()))?;
        Self::from_bytes(&bytes)
            .with_context(|| format!("invalid template {}", path.to_string_lossy()))
    }

    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).context("invalid zip archive")?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .with_context(|| format!("failed to open zip entry #{}", i))?;
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .with_context(|| format!("failed to read zip entry {}", name))?;
            entries.push((name, data));
        }
        Ok(Package { entries })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_slice())
    }

    pub fn part_text(&self, name: &str) -> anyhow::Result<String> {
        let data = self
            .part(name)
            .ok_or_else(|| anyhow!("package has no part {}", name))?;
        String::from_utf8(data.to_vec()).with_context(|| format!("part {} is not UTF-8", name))
    }

    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = data,
            None => self.entries.push((name.to_string(), data)),
        }
    }

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in &self.entries {
            zip.start_file(name.as_str(), opts)
                .with_context(|| format!("failed to start entry {}", name))?;
            zip.write_all(data)
                .with_context(|| format!("failed to write entry {}", name))?;
        }
        let cursor = zip.finish().context("failed to finalize zip package")?;
        Ok(cursor.into_inner())
    }
}

pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ if entity.starts_with("#x") => u32::from_str_radix(&entity[2..], 16)
                .ok()
                .and_then(char::from_u32),
            _ if entity.starts_with('#') => entity[1..].parse::<u32>().ok().and_then(char::from_u32),
            _ => None,
        };
        match decoded {
            Some(c) => out.push(c),
            None => out.push_str(&tail[..=semi]),
        }
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    out
}

/// Value of `name="..."` inside a start tag.
pub(crate) fn attr<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!(" {}=\"", name);
    let start = tag.find(&needle)? + needle.len();
    let len = tag[start..].find('"')?;
    Some(&tag[start..start + len])
}

/// End offset (exclusive) of the element that starts at `start`, handling nesting of the
/// same tag name and self-closing forms.
pub(crate) fn element_end(xml: &str, start: usize, tag: &str) -> Option<usize> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let first_gt = start + xml[start..].find('>')?;
    if xml[..first_gt].ends_with('/') {
        return Some(first_gt + 1);
    }
    let mut depth = 1usize;
    let mut pos = first_gt + 1;
    loop {
        let next_open = find_tag(xml, pos, &open);
        let next_close = xml[pos..].find(&close).map(|i| pos + i)?;
        match next_open {
            Some(o) if o < next_close => {
                let gt = o + xml[o..].find('>')?;
                if !xml[..gt].ends_with('/') {
                    depth += 1;
                }
                pos = gt + 1;
            }
            _ => {
                depth -= 1;
                pos = next_close + close.len();
                if depth == 0 {
                    return Some(pos);
                }
            }
        }
    }
}

/// Next `<tag` at or after `from` that is the whole tag name, not a prefix
/// of a longer one (`<w:p` must not match `<w:pPr`).
pub(crate) fn find_tag(xml: &str, from: usize, open: &str) -> Option<usize> {
    let mut pos = from;
    while let Some(i) = xml[pos..].find(open) {
        let at = pos + i;
        let after = xml[at + open.len()..].chars().next();
        if matches!(after, Some(' ') | Some('>') | Some('/') | Some('\n') | Some('\r') | Some('\t')) {
            return Some(at);
        }
        pos = at + open.len();
    }
    None
}

/// Concatenated character data of every `<tag>` element in `xml`, in order.
pub(crate) fn collect_text(xml: &str, tag: &str) -> String {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut out = String::new();
    let mut pos = 0;
    while let Some(start) = find_tag(xml, pos, &open) {
        let Some(gt) = xml[start..].find('>').map(|i| start + i) else {
            break;
        };
        if xml[..gt].ends_with('/') {
            pos = gt + 1;
            continue;
        }
        let Some(end) = xml[gt..].find(&close).map(|i| gt + i) else {
            break;
        };
        out.push_str(&unescape_xml(&xml[gt + 1..end]));
        pos = end + close.len();
    }
    out
}

/// Returns `start_tag` with `name` set to `value`, adding the attribute when absent.
pub(crate) fn set_attr(start_tag: &str, name: &str, value: &str) -> String {
    let needle = format!(" {}=\"", name);
    if let Some(at) = start_tag.find(&needle) {
        let vstart = at + needle.len();
        if let Some(len) = start_tag[vstart..].find('"') {
            return format!(
                "{}{}{}",
                &start_tag[..vstart],
                value,
                &start_tag[vstart + len..]
            );
        }
    }
    let insert_at = if start_tag.ends_with("/>") {
        start_tag.len() - 2
    } else {
        start_tag.len() - 1
    };
    format!(
        "{} {}=\"{}\"{}",
        &start_tag[..insert_at],
        name,
        value,
        &start_tag[insert_at..]
    )
}
