use super::{collect_text, element_end, escape_xml, find_tag, Package};
use anyhow::anyhow;

const DOCUMENT_PART: &str = "word/document.xml";

/// One paragraph to be inserted into a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewParagraph {
    pub text: String,
    pub bold: bool,
    pub bullet: bool,
    /// Thin rule under the paragraph, used to separate repeated blocks.
    pub border_bottom: bool,
}

impl NewParagraph {
    pub fn plain(text: impl Into<String>) -> Self {
        NewParagraph {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        NewParagraph {
            text: text.into(),
            bold: true,
            ..Default::default()
        }
    }

    pub fn bullet(text: impl Into<String>) -> Self {
        NewParagraph {
            text: text.into(),
            bullet: true,
            ..Default::default()
        }
    }

    pub fn with_border(mut self) -> Self {
        self.border_bottom = true;
        self
    }

    fn to_xml(&self) -> String {
        let mut ppr = String::new();
        if self.border_bottom {
            ppr.push_str(
                "<w:pBdr><w:bottom w:val=\"single\" w:sz=\"4\" w:space=\"1\" w:color=\"auto\"/></w:pBdr>",
            );
        }
        if self.bullet {
            ppr.push_str("<w:ind w:left=\"360\" w:hanging=\"360\"/>");
        }
        let ppr = if ppr.is_empty() {
            String::new()
        } else {
            format!("<w:pPr>{}</w:pPr>", ppr)
        };
        let rpr = if self.bold { "<w:rPr><w:b/></w:rPr>" } else { "" };
        let text = if self.bullet {
            format!("• {}", self.text)
        } else {
            self.text.clone()
        };
        if text.is_empty() {
            return format!("<w:p>{}</w:p>", ppr);
        }
        format!(
            "<w:p>{}<w:r>{}<w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
            ppr,
            rpr,
            escape_xml(&text)
        )
    }
}

pub struct Document {
    package: Package,
    xml: String,
}

impl Document {
    pub fn open(package: Package) -> anyhow::Result<Self> {
        if package.part(DOCUMENT_PART).is_none() {
            return Err(anyhow!("package is not a word document (no {})", DOCUMENT_PART));
        }
        let xml = package.part_text(DOCUMENT_PART)?;
        Ok(Document { package, xml })
    }

    #[cfg(test)]
    pub fn paragraph_texts(&self) -> Vec<String> {
        paragraph_ranges(&self.xml)
            .into_iter()
            .map(|(s, e)| collect_text(&self.xml[s..e], "w:t"))
            .collect()
    }

    /// Runs `substitute` over the text of every paragraph, table cells
    /// included. Paragraphs for which it returns `None` stay untouched.
    pub fn rewrite_paragraphs<F>(&mut self, mut substitute: F) -> usize
    where
        F: FnMut(&str) -> Option<String>,
    {
        let ranges = paragraph_ranges(&self.xml);
        let mut out = String::with_capacity(self.xml.len());
        let mut last = 0;
        let mut changed = 0;
        for (start, end) in ranges {
            let para = &self.xml[start..end];
            let text = collect_text(para, "w:t");
            let Some(new_text) = substitute(&text) else {
                continue;
            };
            out.push_str(&self.xml[last..start]);
            out.push_str(&rebuild_paragraph(para, &new_text));
            last = end;
            changed += 1;
        }
        out.push_str(&self.xml[last..]);
        self.xml = out;
        changed
    }

    /// Replaces the first paragraph whose text is exactly `marker` with
    /// `paragraphs`, in order. Returns false when there is no such paragraph.
    pub fn replace_marker(&mut self, marker: &str, paragraphs: &[NewParagraph]) -> bool {
        let found = paragraph_ranges(&self.xml)
            .into_iter()
            .find(|(s, e)| collect_text(&self.xml[*s..*e], "w:t").trim() == marker);
        let Some((start, end)) = found else {
            return false;
        };
        let mut anchor = end;
        let mut xml = self.xml.clone();
        for p in paragraphs {
            let frag = p.to_xml();
            xml.insert_str(anchor, &frag);
            anchor += frag.len();
        }
        xml.replace_range(start..end, "");
        self.xml = xml;
        true
    }

    pub fn into_bytes(mut self) -> anyhow::Result<Vec<u8>> {
        self.package.set_part(DOCUMENT_PART, self.xml.into_bytes());
        self.package.to_bytes()
    }
}

/// Byte ranges of every `<w:p>` in document order. Paragraphs nested in
/// table cells are found because the scan descends into `<w:tbl>`.
fn paragraph_ranges(xml: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(at) = find_tag(xml, pos, "<w:p") {
        let Some(end) = element_end(xml, at, "w:p") else {
            break;
        };
        out.push((at, end));
        pos = end;
    }
    out
}

fn rebuild_paragraph(para: &str, text: &str) -> String {
    let tag_end = para.find('>').map(|i| i + 1).unwrap_or(para.len());
    let start_tag = para[..tag_end].trim_end_matches("/>");
    let start_tag = if start_tag.ends_with('>') {
        start_tag.to_string()
    } else {
        format!("{}>", start_tag)
    };
    let ppr = child_element(para, "w:pPr").unwrap_or("");
    let rpr = find_tag(para, 0, "<w:r")
        .and_then(|r| element_end(para, r, "w:r").map(|e| &para[r..e]))
        .and_then(|run| child_element(run, "w:rPr"))
        .unwrap_or("");
    format!(
        "{}{}<w:r>{}<w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
        start_tag,
        ppr,
        rpr,
        escape_xml(text)
    )
}

fn child_element<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let at = find_tag(xml, 0, &format!("<{}", tag))?;
    let end = element_end(xml, at, tag)?;
    Some(&xml[at..end])
}
